use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use log::{info, warn};

use super::clock::IntervalGate;
use super::gpu::{GpuDevice, GpuProvider, NoGpu};
use super::provider::{OsMetricsProvider, ProviderError};
use super::rate::{Channel, CounterSnapshot, RateEstimator};
use super::reference::DecayingReferenceMax;
use super::series::RollingSeriesBuffer;
use super::units::DisplayUnit;

/// One throughput channel for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateReading {
    pub bytes_per_sec: f64,
    /// `bytes_per_sec` in the sampler's display unit.
    pub display_value: f64,
    /// `display_value` against the channel's decaying reference, 0..=100.
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkReading {
    pub up: RateReading,
    pub down: RateReading,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskReading {
    pub read: RateReading,
    pub write: RateReading,
}

/// Every value shown for one tick, read in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsFrame {
    pub cpu_percent: f32,
    pub per_core_percent: Vec<f32>,
    pub per_core_frequency_mhz: Vec<u64>,
    pub memory_percent: f32,
    pub network: NetworkReading,
    pub disk: DiskReading,
    /// Empty when no GPU backend is available.
    pub gpus: Vec<GpuDevice>,
    pub unit: DisplayUnit,
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub history_len: usize,
    pub core_history_len: usize,
    pub gpu_refresh: Duration,
    pub display_unit: DisplayUnit,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            history_len: 400,
            core_history_len: 200,
            gpu_refresh: Duration::from_millis(100),
            display_unit: DisplayUnit::default(),
        }
    }
}

/// Rolling history of every plotted series. Rate series hold bytes/s.
#[derive(Debug, Clone)]
pub struct SeriesSet {
    pub cpu: RollingSeriesBuffer,
    pub memory: RollingSeriesBuffer,
    pub per_core: Vec<RollingSeriesBuffer>,
    pub net_up: RollingSeriesBuffer,
    pub net_down: RollingSeriesBuffer,
    pub disk_read: RollingSeriesBuffer,
    pub disk_write: RollingSeriesBuffer,
    pub gpu_utilization: Vec<RollingSeriesBuffer>,
    /// VRAM in use, percent of total.
    pub gpu_vram: Vec<RollingSeriesBuffer>,
    pub gpu_temperature: Vec<RollingSeriesBuffer>,
    history_len: usize,
    core_history_len: usize,
}

impl SeriesSet {
    pub fn new(history_len: usize, core_history_len: usize) -> Self {
        Self {
            cpu: RollingSeriesBuffer::new(history_len),
            memory: RollingSeriesBuffer::new(history_len),
            per_core: Vec::new(),
            net_up: RollingSeriesBuffer::new(history_len),
            net_down: RollingSeriesBuffer::new(history_len),
            disk_read: RollingSeriesBuffer::new(history_len),
            disk_write: RollingSeriesBuffer::new(history_len),
            gpu_utilization: Vec::new(),
            gpu_vram: Vec::new(),
            gpu_temperature: Vec::new(),
            history_len,
            core_history_len,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn core_history_len(&self) -> usize {
        self.core_history_len
    }

    fn push_frame(&mut self, frame: &MetricsFrame) {
        self.cpu.append(f64::from(frame.cpu_percent));
        self.memory.append(f64::from(frame.memory_percent));

        resize_buffers(&mut self.per_core, frame.per_core_percent.len(), self.core_history_len);
        for (buffer, value) in self.per_core.iter_mut().zip(&frame.per_core_percent) {
            buffer.append(f64::from(*value));
        }

        self.net_up.append(frame.network.up.bytes_per_sec);
        self.net_down.append(frame.network.down.bytes_per_sec);
        self.disk_read.append(frame.disk.read.bytes_per_sec);
        self.disk_write.append(frame.disk.write.bytes_per_sec);
    }

    fn push_gpus(&mut self, gpus: &[GpuDevice]) {
        let n = gpus.len();
        resize_buffers(&mut self.gpu_utilization, n, self.history_len);
        resize_buffers(&mut self.gpu_vram, n, self.history_len);
        resize_buffers(&mut self.gpu_temperature, n, self.history_len);

        for (i, gpu) in gpus.iter().enumerate() {
            let vram_percent = if gpu.vram_total_mb > 0.0 {
                (gpu.vram_used_mb / gpu.vram_total_mb * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            };
            self.gpu_utilization[i].append(f64::from(gpu.utilization));
            self.gpu_vram[i].append(vram_percent);
            self.gpu_temperature[i].append(gpu.temperature_c);
        }
    }
}

fn resize_buffers(buffers: &mut Vec<RollingSeriesBuffer>, len: usize, capacity: usize) {
    if buffers.len() != len {
        buffers.resize_with(len, || RollingSeriesBuffer::new(capacity));
    }
}

const RATE_CHANNELS: [Channel; 4] = [
    Channel::NetSent,
    Channel::NetRecv,
    Channel::DiskRead,
    Channel::DiskWrite,
];

/// Turns raw provider reads into frames and history, one tick at a time.
///
/// Runs on the UI thread. Each read is isolated: a failing channel falls back
/// to its last value (percentages) or to zero (rates) and the rest of the tick
/// goes on.
pub struct MetricsSampler<P: OsMetricsProvider> {
    provider: P,
    gpu: Box<dyn GpuProvider>,
    rates: RateEstimator,
    references: HashMap<Channel, DecayingReferenceMax>,
    unit: DisplayUnit,
    series: SeriesSet,
    gpu_gate: IntervalGate,
    gpus: Vec<GpuDevice>,
    /// Monotonic reading of the first sample; counter timestamps are offsets
    /// from it.
    origin: Option<Instant>,
    last: MetricsFrame,
    failing: HashSet<&'static str>,
}

impl<P: OsMetricsProvider> MetricsSampler<P> {
    pub fn new(provider: P, gpu: Box<dyn GpuProvider>, config: SamplerConfig) -> Self {
        Self {
            provider,
            gpu,
            rates: RateEstimator::new(),
            references: RATE_CHANNELS
                .iter()
                .map(|channel| (*channel, DecayingReferenceMax::default()))
                .collect(),
            unit: config.display_unit,
            series: SeriesSet::new(config.history_len, config.core_history_len),
            gpu_gate: IntervalGate::new(config.gpu_refresh),
            gpus: Vec::new(),
            origin: None,
            last: MetricsFrame {
                unit: config.display_unit,
                ..MetricsFrame::default()
            },
            failing: HashSet::new(),
        }
    }

    /// A sampler without any GPU backend.
    pub fn without_gpu(provider: P, config: SamplerConfig) -> Self {
        Self::new(provider, Box::new(NoGpu), config)
    }

    pub fn sample(&mut self, dt_seconds: f64) -> MetricsFrame {
        self.sample_at(dt_seconds, Instant::now())
    }

    /// Samples with `now` as the monotonic read time.
    ///
    /// `dt_seconds` drives the reference decay and the GPU gate and is dropped
    /// by the caller while paused. Rates are measured against `now`, so counter
    /// growth during a pause is spread over the real time it took.
    pub fn sample_at(&mut self, dt_seconds: f64, now: Instant) -> MetricsFrame {
        let dt_seconds = if dt_seconds.is_finite() { dt_seconds.max(0.0) } else { 0.0 };
        let dt = Duration::try_from_secs_f64(dt_seconds).unwrap_or_default();
        let timestamp = now.saturating_duration_since(*self.origin.get_or_insert(now));

        // Read everything before touching any derived state.
        let cpu = self.provider.cpu_percent();
        let per_core = self.provider.cpu_percent_percpu();
        let frequencies = self.provider.cpu_frequencies_mhz();
        let memory = self.provider.virtual_memory_percent();
        let net = self.provider.net_io_counters();
        let disk = self.provider.disk_io_counters();
        let gpu_due = self.gpu_gate.advance(dt);
        if gpu_due {
            self.gpu.refresh();
            self.gpus = self.gpu.devices();
        }

        let cpu_percent = self
            .check("cpu", cpu)
            .map(|v| v.clamp(0.0, 100.0))
            .unwrap_or(self.last.cpu_percent);
        let per_core_percent = self
            .check("per-core cpu", per_core)
            .unwrap_or_else(|| self.last.per_core_percent.clone());
        let per_core_frequency_mhz = self
            .check("cpu frequency", frequencies)
            .unwrap_or_else(|| self.last.per_core_frequency_mhz.clone());
        let memory_percent = self
            .check("memory", memory)
            .map(|v| v.clamp(0.0, 100.0))
            .unwrap_or(self.last.memory_percent);

        let network = match self.check("network", net) {
            Some(counters) => NetworkReading {
                up: self.rate(Channel::NetSent, counters.bytes_sent, timestamp, dt_seconds),
                down: self.rate(Channel::NetRecv, counters.bytes_recv, timestamp, dt_seconds),
            },
            None => NetworkReading {
                up: self.idle_rate(Channel::NetSent, dt_seconds),
                down: self.idle_rate(Channel::NetRecv, dt_seconds),
            },
        };
        let disk = match self.check("disk", disk) {
            Some(counters) => DiskReading {
                read: self.rate(Channel::DiskRead, counters.read_bytes, timestamp, dt_seconds),
                write: self.rate(Channel::DiskWrite, counters.write_bytes, timestamp, dt_seconds),
            },
            None => DiskReading {
                read: self.idle_rate(Channel::DiskRead, dt_seconds),
                write: self.idle_rate(Channel::DiskWrite, dt_seconds),
            },
        };

        let frame = MetricsFrame {
            cpu_percent,
            per_core_percent,
            per_core_frequency_mhz,
            memory_percent,
            network,
            disk,
            gpus: self.gpus.clone(),
            unit: self.unit,
        };

        self.series.push_frame(&frame);
        if gpu_due {
            self.series.push_gpus(&self.gpus);
        }
        self.last = frame.clone();
        frame
    }

    fn rate(
        &mut self,
        channel: Channel,
        value: u64,
        timestamp: Duration,
        dt_seconds: f64,
    ) -> RateReading {
        let bytes_per_sec = self
            .rates
            .estimate(channel, CounterSnapshot::new(value, timestamp));
        self.reading(channel, bytes_per_sec, dt_seconds)
    }

    /// Reading for a channel whose counters could not be read this tick.
    fn idle_rate(&mut self, channel: Channel, dt_seconds: f64) -> RateReading {
        self.reading(channel, 0.0, dt_seconds)
    }

    fn reading(&mut self, channel: Channel, bytes_per_sec: f64, dt_seconds: f64) -> RateReading {
        let display_value = self.unit.convert(bytes_per_sec);
        let reference = self.references.entry(channel).or_default();
        reference.update(display_value, dt_seconds);
        RateReading {
            bytes_per_sec,
            display_value,
            percent: reference.as_percentage(display_value),
        }
    }

    /// Logs the first failure of a streak and the recovery after it.
    fn check<T>(&mut self, name: &'static str, result: Result<T, ProviderError>) -> Option<T> {
        match result {
            Ok(value) => {
                if self.failing.remove(name) {
                    info!("{name} readings recovered");
                }
                Some(value)
            }
            Err(e) => {
                if self.failing.insert(name) {
                    warn!("{name} read failed, using fallback: {e}");
                }
                None
            }
        }
    }

    pub fn display_unit(&self) -> DisplayUnit {
        self.unit
    }

    /// Switches the display unit. Every decaying reference restarts at 1.0,
    /// since its history is in the old unit. Returns whether anything changed.
    pub fn set_display_unit(&mut self, unit: DisplayUnit) -> bool {
        if unit == self.unit {
            return false;
        }
        self.unit = unit;
        for reference in self.references.values_mut() {
            reference.reset(1.0);
        }
        true
    }

    pub fn reference(&self, channel: Channel) -> Option<&DecayingReferenceMax> {
        self.references.get(&channel)
    }

    pub fn set_gpu_refresh_interval(&mut self, interval: Duration) {
        self.gpu_gate.set_interval(interval);
    }

    pub fn gpu_refresh_interval(&self) -> Duration {
        self.gpu_gate.interval()
    }

    /// Starts history over with new buffer sizes.
    pub fn set_history_len(&mut self, history_len: usize, core_history_len: usize) {
        if history_len == self.series.history_len && core_history_len == self.series.core_history_len {
            return;
        }
        self.series = SeriesSet::new(history_len, core_history_len);
    }

    pub fn series(&self) -> &SeriesSet {
        &self.series
    }

    pub fn last_frame(&self) -> &MetricsFrame {
        &self.last
    }

    pub fn gpu_backend(&self) -> &'static str {
        self.gpu.backend()
    }

    pub fn gpu_names(&self) -> Vec<String> {
        self.gpu.names()
    }

    /// Channels currently failing, for the status bar.
    pub fn failing_channels(&self) -> Vec<&'static str> {
        let mut failing: Vec<_> = self.failing.iter().copied().collect();
        failing.sort_unstable();
        failing
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::provider::{DiskCounters, NetCounters};

    #[derive(Default)]
    struct Scripted {
        cpu: Vec<Result<f32, ProviderError>>,
        sent: Vec<u64>,
        tick: usize,
    }

    impl OsMetricsProvider for Scripted {
        fn cpu_percent(&mut self) -> Result<f32, ProviderError> {
            self.tick += 1;
            match self.cpu.get_mut(self.tick - 1) {
                Some(result) => std::mem::replace(result, Ok(0.0)),
                None => Ok(0.0),
            }
        }
        fn cpu_percent_percpu(&mut self) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![10.0, 20.0])
        }
        fn virtual_memory_percent(&mut self) -> Result<f32, ProviderError> {
            Ok(50.0)
        }
        fn net_io_counters(&mut self) -> Result<NetCounters, ProviderError> {
            Ok(NetCounters {
                bytes_sent: self.sent.get(self.tick - 1).copied().unwrap_or(0),
                bytes_recv: 0,
            })
        }
        fn disk_io_counters(&mut self) -> Result<DiskCounters, ProviderError> {
            Ok(DiskCounters::default())
        }
    }

    #[test]
    fn cpu_failure_keeps_last_value() {
        let provider = Scripted {
            cpu: vec![Ok(35.0), Err(ProviderError::Unavailable("cpu"))],
            ..Scripted::default()
        };
        let mut sampler = MetricsSampler::without_gpu(provider, SamplerConfig::default());

        assert_eq!(sampler.sample(0.1).cpu_percent, 35.0);
        assert_eq!(sampler.sample(0.1).cpu_percent, 35.0);
        assert_eq!(sampler.failing_channels(), vec!["cpu"]);
        assert_eq!(sampler.sample(0.1).cpu_percent, 0.0);
        assert!(sampler.failing_channels().is_empty());
    }

    #[test]
    fn unit_change_resets_references() {
        let provider = Scripted {
            sent: vec![0, 50_000_000],
            ..Scripted::default()
        };
        let mut sampler = MetricsSampler::without_gpu(provider, SamplerConfig::default());
        let start = Instant::now();
        sampler.sample_at(1.0, start);
        let frame = sampler.sample_at(1.0, start + Duration::from_secs(1));
        assert_eq!(frame.network.up.bytes_per_sec, 50_000_000.0);
        assert_eq!(frame.network.up.percent, 100.0);
        assert!(sampler.reference(Channel::NetSent).unwrap().current() > 40.0);

        assert!(sampler.set_display_unit(DisplayUnit::Decimal));
        assert!(!sampler.set_display_unit(DisplayUnit::Decimal));
        for channel in RATE_CHANNELS {
            assert_eq!(sampler.reference(channel).unwrap().current(), 1.0);
        }
    }

    #[test]
    fn history_is_appended_every_tick() {
        let mut sampler = MetricsSampler::without_gpu(
            Scripted::default(),
            SamplerConfig {
                history_len: 3,
                core_history_len: 2,
                ..SamplerConfig::default()
            },
        );
        for _ in 0..5 {
            sampler.sample(0.1);
        }
        let series = sampler.series();
        assert_eq!(series.memory.values(), vec![50.0, 50.0, 50.0]);
        assert_eq!(series.per_core.len(), 2);
        assert_eq!(series.per_core[1].values(), vec![20.0, 20.0]);
        assert_eq!(series.net_up.window_bounds(), (2, 5));
        assert!(series.gpu_utilization.is_empty());
    }

    #[test]
    fn rates_use_read_time_not_tick_time() {
        let provider = Scripted {
            sent: vec![0, 100_000, 11_100_000],
            ..Scripted::default()
        };
        let mut sampler = MetricsSampler::without_gpu(provider, SamplerConfig::default());
        let start = Instant::now();
        sampler.sample_at(0.1, start);
        let before = sampler.sample_at(0.1, start + Duration::from_millis(100));
        assert_eq!(before.network.up.bytes_per_sec, 1_000_000.0);

        // Ten seconds without a sample, then a tick reporting only 100 ms.
        let after = sampler.sample_at(0.1, start + Duration::from_millis(11_100));
        assert_eq!(after.network.up.bytes_per_sec, 1_000_000.0);
    }

    #[test]
    fn nonsense_dt_does_not_decay() {
        let mut sampler = MetricsSampler::without_gpu(Scripted::default(), SamplerConfig::default());
        sampler.sample(f64::NAN);
        sampler.sample(-3.0);
        assert_eq!(sampler.reference(Channel::DiskRead).unwrap().current(), 1.0);
    }
}
