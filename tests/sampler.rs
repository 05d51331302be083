use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sysvis::metrics::{
    Channel, DiskCounters, DisplayUnit, GpuProvider, MetricsFrame, MetricsSampler, NetCounters,
    OsMetricsProvider, ProviderError, RateReading, SamplerConfig, TickTimer,
};

/// Provider whose net counters follow a script and whose disk counters can be
/// switched off.
#[derive(Default)]
struct MockProvider {
    cpu: f32,
    sent: Vec<u64>,
    disk_fails: bool,
    tick: usize,
}

impl OsMetricsProvider for MockProvider {
    fn cpu_percent(&mut self) -> Result<f32, ProviderError> {
        self.tick += 1;
        Ok(self.cpu)
    }

    fn cpu_percent_percpu(&mut self) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![self.cpu; 4])
    }

    fn virtual_memory_percent(&mut self) -> Result<f32, ProviderError> {
        Ok(63.5)
    }

    fn net_io_counters(&mut self) -> Result<NetCounters, ProviderError> {
        let bytes_sent = self.sent.get(self.tick - 1).copied().unwrap_or_default();
        Ok(NetCounters {
            bytes_sent,
            bytes_recv: bytes_sent / 2,
        })
    }

    fn disk_io_counters(&mut self) -> Result<DiskCounters, ProviderError> {
        if self.disk_fails {
            return Err(ProviderError::Unavailable("disk counters"));
        }
        Ok(DiskCounters {
            read_bytes: self.tick as u64 * 4096,
            write_bytes: 0,
        })
    }
}

/// Feeds the sampler synthetic read times that advance by each tick's `dt`.
struct Clock {
    now: Instant,
}

impl Clock {
    fn new() -> Self {
        Self { now: Instant::now() }
    }

    fn sample<P: OsMetricsProvider>(&mut self, sampler: &mut MetricsSampler<P>, dt: f64) -> MetricsFrame {
        self.now += Duration::from_secs_f64(dt);
        sampler.sample_at(dt, self.now)
    }
}

#[test]
fn disk_failure_leaves_other_channels_alone() {
    let provider = MockProvider {
        cpu: 42.0,
        disk_fails: true,
        ..MockProvider::default()
    };
    let mut sampler = MetricsSampler::without_gpu(provider, SamplerConfig::default());

    for _ in 0..3 {
        let frame = sampler.sample(0.5);
        assert_eq!(frame.cpu_percent, 42.0);
        assert_eq!(frame.memory_percent, 63.5);
        assert_eq!(frame.per_core_percent, vec![42.0; 4]);
        assert_eq!(frame.disk.read, RateReading::default());
        assert_eq!(frame.disk.write, RateReading::default());
    }
    assert_eq!(sampler.failing_channels(), vec!["disk"]);
    assert_eq!(sampler.series().disk_read.values(), vec![0.0, 0.0, 0.0]);
    assert_eq!(sampler.series().cpu.values(), vec![42.0, 42.0, 42.0]);
}

#[test]
fn one_megabyte_per_second_upload() {
    let provider = MockProvider {
        sent: vec![1_000_000, 2_000_000],
        ..MockProvider::default()
    };
    let mut sampler = MetricsSampler::without_gpu(provider, SamplerConfig::default());
    let mut clock = Clock::new();

    let warm_up = clock.sample(&mut sampler, 1.0);
    assert_eq!(warm_up.network.up.bytes_per_sec, 0.0);

    let frame = clock.sample(&mut sampler, 1.0);
    assert_eq!(frame.network.up.bytes_per_sec, 1_000_000.0);
    assert_eq!(frame.network.down.bytes_per_sec, 500_000.0);
    assert_eq!(frame.unit.format_rate(frame.network.up.bytes_per_sec), "0.95 MiB/s");
    assert_eq!(
        DisplayUnit::Decimal.format_rate(frame.network.up.bytes_per_sec),
        "1.00 MB/s"
    );
    assert!((frame.network.up.display_value - 1_000_000.0 / 1_048_576.0).abs() < 1e-12);
}

#[test]
fn decimal_unit_converts_display_value() {
    let provider = MockProvider {
        sent: vec![0, 3_000_000],
        ..MockProvider::default()
    };
    let config = SamplerConfig {
        display_unit: DisplayUnit::Decimal,
        ..SamplerConfig::default()
    };
    let mut sampler = MetricsSampler::without_gpu(provider, config);
    let mut clock = Clock::new();
    clock.sample(&mut sampler, 1.0);
    let frame = clock.sample(&mut sampler, 1.5);

    assert_eq!(frame.network.up.bytes_per_sec, 2_000_000.0);
    assert_eq!(frame.network.up.display_value, 2.0);
    assert_eq!(frame.network.up.percent, 100.0);
}

#[test]
fn disk_rate_follows_counters() {
    let mut sampler = MetricsSampler::without_gpu(MockProvider::default(), SamplerConfig::default());
    let mut clock = Clock::new();
    clock.sample(&mut sampler, 0.25);
    let frame = clock.sample(&mut sampler, 0.25);
    assert_eq!(frame.disk.read.bytes_per_sec, 4096.0 / 0.25);
    assert!(sampler.failing_channels().is_empty());
}

struct FakeGpu {
    refreshes: Arc<AtomicUsize>,
}

impl GpuProvider for FakeGpu {
    fn names(&self) -> Vec<String> {
        vec!["Fake GPU".to_string()]
    }
    fn utilizations(&self) -> Vec<f32> {
        vec![self.refreshes.load(Ordering::SeqCst) as f32]
    }
    fn vram_info(&self) -> Vec<(f64, f64)> {
        vec![(512.0, 2048.0)]
    }
    fn frequencies_mhz(&self) -> Vec<f64> {
        vec![1500.0]
    }
    fn temperatures_c(&self) -> Vec<f64> {
        vec![55.0]
    }
    fn refresh(&mut self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
    fn backend(&self) -> &'static str {
        "fake"
    }
}

#[test]
fn gpu_is_refreshed_on_its_own_interval() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let gpu = FakeGpu {
        refreshes: Arc::clone(&refreshes),
    };
    let config = SamplerConfig {
        gpu_refresh: Duration::from_millis(250),
        ..SamplerConfig::default()
    };
    let mut sampler = MetricsSampler::new(MockProvider::default(), Box::new(gpu), config);

    let frames: Vec<_> = (0..5).map(|_| sampler.sample(0.1)).collect();

    assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    assert!(frames.iter().all(|frame| frame.gpus.len() == 1));
    assert_eq!(frames[0].gpus[0].name, "Fake GPU");
    assert_eq!(frames[2].gpus[0].utilization, 1.0);
    assert_eq!(frames[4].gpus[0].utilization, 2.0);

    let series = sampler.series();
    assert_eq!(series.gpu_utilization[0].values(), vec![1.0, 2.0]);
    assert_eq!(series.gpu_vram[0].values(), vec![25.0, 25.0]);
    assert_eq!(series.cpu.len(), 5);
}

/// Uploads a steady 1 MB/s of wall time, whether or not anyone is sampling.
struct SteadyUpload {
    start: Instant,
    now: Rc<Cell<Instant>>,
}

impl OsMetricsProvider for SteadyUpload {
    fn cpu_percent(&mut self) -> Result<f32, ProviderError> {
        Ok(5.0)
    }

    fn cpu_percent_percpu(&mut self) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![5.0])
    }

    fn virtual_memory_percent(&mut self) -> Result<f32, ProviderError> {
        Ok(30.0)
    }

    fn net_io_counters(&mut self) -> Result<NetCounters, ProviderError> {
        let elapsed_ms = self.now.get().duration_since(self.start).as_millis() as u64;
        Ok(NetCounters {
            bytes_sent: elapsed_ms * 1_000,
            bytes_recv: 0,
        })
    }

    fn disk_io_counters(&mut self) -> Result<DiskCounters, ProviderError> {
        Ok(DiskCounters::default())
    }
}

#[test]
fn resuming_after_pause_reports_the_true_average() {
    let start = Instant::now();
    let now = Rc::new(Cell::new(start));
    let provider = SteadyUpload {
        start,
        now: Rc::clone(&now),
    };
    let mut sampler = MetricsSampler::without_gpu(provider, SamplerConfig::default());
    let mut timer = TickTimer::starting_at(Duration::from_millis(100), start);

    // 5 s running, 10 s paused, 5 s running; the UI polls every 100 ms.
    let mut rates = Vec::new();
    let mut resumed_at = None;
    for step in 1..=200u64 {
        let t = start + Duration::from_millis(step * 100);
        now.set(t);
        let paused = (50..150).contains(&step);
        if let Some(dt) = timer.poll_at(t) {
            if !paused {
                if step == 150 {
                    resumed_at = Some(rates.len());
                }
                rates.push(sampler.sample_at(dt.as_secs_f64(), t).network.up.bytes_per_sec);
            }
        }
    }

    let resumed = resumed_at.expect("ticks after the pause");
    assert_eq!(rates.len(), 100);
    assert_eq!(rates[0], 0.0);
    assert!(rates[1..].iter().all(|rate| (rate - 1_000_000.0).abs() < 1e-3));
    assert!((rates[resumed] - 1_000_000.0).abs() < 1e-3);

    let reference = sampler
        .reference(Channel::NetSent)
        .map(|reference| reference.current())
        .unwrap_or_default();
    assert!(reference < 1.0, "reference inflated to {reference} MiB/s");
}
