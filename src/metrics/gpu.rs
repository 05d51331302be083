use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use thiserror::Error;

use super::mailbox::Mailbox;

/// How long a single nvidia-smi invocation may take before it is killed.
/// How long a finished command's output may take to arrive from the reader.
const READ_GRACE: Duration = Duration::from_millis(50);

pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(1500);

const NVIDIA_SMI: &str = "nvidia-smi";
const SMI_QUERY: &str = "--query-gpu=name,utilization.gpu,memory.used,memory.total,clocks.current.graphics,temperature.gpu";

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} timed out after {timeout:?}")]
    Timeout {
        command: &'static str,
        timeout: Duration,
    },
    #[error("{command} exited with {status}")]
    Status {
        command: &'static str,
        status: std::process::ExitStatus,
    },
}

/// Reading for one device; zero means "not reported".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuDevice {
    pub name: String,
    pub utilization: f32,
    pub vram_used_mb: f64,
    pub vram_total_mb: f64,
    pub frequency_mhz: f64,
    pub temperature_c: f64,
}

/// Capability interface over a GPU backend.
///
/// Every accessor returns one entry per device, in device order. An empty list
/// means the metric is unavailable; backends never surface errors through it.
pub trait GpuProvider: Send {
    fn names(&self) -> Vec<String>;
    fn utilizations(&self) -> Vec<f32>;
    fn vram_info(&self) -> Vec<(f64, f64)>;
    fn frequencies_mhz(&self) -> Vec<f64>;
    fn temperatures_c(&self) -> Vec<f64>;

    /// Pulls fresh readings into the accessors. Called on the UI thread, so it
    /// must not block.
    fn refresh(&mut self) {}

    fn backend(&self) -> &'static str;

    fn devices(&self) -> Vec<GpuDevice> {
        let names = self.names();
        let utils = self.utilizations();
        let vram = self.vram_info();
        let freqs = self.frequencies_mhz();
        let temps = self.temperatures_c();

        utils
            .iter()
            .enumerate()
            .map(|(i, utilization)| {
                let (vram_used_mb, vram_total_mb) = vram.get(i).copied().unwrap_or_default();
                GpuDevice {
                    name: names.get(i).cloned().unwrap_or_else(|| format!("GPU {i}")),
                    utilization: *utilization,
                    vram_used_mb,
                    vram_total_mb,
                    frequency_mhz: freqs.get(i).copied().unwrap_or_default(),
                    temperature_c: temps.get(i).copied().unwrap_or_default(),
                }
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct NoGpu;

impl GpuProvider for NoGpu {
    fn names(&self) -> Vec<String> {
        Vec::new()
    }
    fn utilizations(&self) -> Vec<f32> {
        Vec::new()
    }
    fn vram_info(&self) -> Vec<(f64, f64)> {
        Vec::new()
    }
    fn frequencies_mhz(&self) -> Vec<f64> {
        Vec::new()
    }
    fn temperatures_c(&self) -> Vec<f64> {
        Vec::new()
    }
    fn backend(&self) -> &'static str {
        "none"
    }
}

/// Picks the best available backend: NVML, then nvidia-smi, then nothing.
pub fn detect_gpu_provider(poll_interval: Duration) -> Box<dyn GpuProvider> {
    #[cfg(feature = "nvidia")]
    {
        if let Some(nvml) = nvml::NvmlGpu::init() {
            info!("using NVML for GPU metrics");
            return Box::new(nvml);
        }
    }

    match SmiGpu::spawn(poll_interval) {
        Some(smi) => {
            info!("using nvidia-smi for GPU metrics");
            Box::new(smi)
        }
        None => {
            info!("no GPU metrics backend available");
            Box::new(NoGpu)
        }
    }
}

/// Runs `command` and returns its stdout, killing it once `timeout` elapses.
///
/// Stdout is drained on a helper thread while the child runs, so output larger
/// than the pipe buffer cannot stall it.
pub fn run_command(
    command: &'static str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, GpuError> {
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| GpuError::Spawn { command, source })?;

    let (out_tx, out_rx) = bounded(1);
    let stdout = child.stdout.take();
    let drained = std::thread::Builder::new()
        .name("gpu-cmd-stdout".to_string())
        .spawn(move || {
            let mut out = Vec::new();
            if let Some(mut stdout) = stdout {
                let _ = stdout.read_to_end(&mut out);
            }
            let _ = out_tx.send(out);
        });
    if let Err(source) = drained {
        let _ = child.kill();
        let _ = child.wait();
        return Err(GpuError::Spawn { command, source });
    }

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return Err(GpuError::Status { command, status });
                }
                let remaining = timeout.saturating_sub(start.elapsed()).max(READ_GRACE);
                return match out_rx.recv_timeout(remaining) {
                    Ok(out) => Ok(String::from_utf8_lossy(&out).into_owned()),
                    Err(RecvTimeoutError::Disconnected) => Ok(String::new()),
                    Err(RecvTimeoutError::Timeout) => Err(GpuError::Timeout { command, timeout }),
                };
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(GpuError::Timeout { command, timeout });
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(source) => return Err(GpuError::Spawn { command, source }),
        }
    }
}

/// Parses `nvidia-smi --format=csv,noheader,nounits` output of `SMI_QUERY`.
/// Fields the driver reports as `[N/A]` become zero.
pub fn parse_smi_csv(output: &str) -> Vec<GpuDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let number = |i: usize| {
                fields
                    .get(i)
                    .and_then(|field| field.parse::<f64>().ok())
                    .unwrap_or(0.0)
            };
            GpuDevice {
                name: fields.first().map(|name| name.to_string()).unwrap_or_default(),
                utilization: number(1) as f32,
                vram_used_mb: number(2),
                vram_total_mb: number(3),
                frequency_mhz: number(4),
                temperature_c: number(5),
            }
        })
        .collect()
}

fn query_smi() -> Result<Vec<GpuDevice>, GpuError> {
    let output = run_command(
        NVIDIA_SMI,
        &[SMI_QUERY, "--format=csv,noheader,nounits"],
        COMMAND_TIMEOUT,
    )?;
    Ok(parse_smi_csv(&output))
}

/// nvidia-smi backend.
///
/// Spawning the tool takes tens of milliseconds, so a dedicated poller thread
/// runs it and publishes into a mailbox; `refresh` only picks up what is there.
pub struct SmiGpu {
    devices: Vec<GpuDevice>,
    mailbox: Arc<Mailbox<Vec<GpuDevice>>>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SmiGpu {
    /// Returns `None` when nvidia-smi is missing or reports no devices.
    pub fn spawn(poll_interval: Duration) -> Option<Self> {
        let devices = match query_smi() {
            Ok(devices) if !devices.is_empty() => devices,
            Ok(_) => return None,
            Err(e) => {
                debug!("nvidia-smi unavailable: {e}");
                return None;
            }
        };

        let mailbox = Arc::new(Mailbox::new());
        let (stop, stop_rx) = bounded::<()>(1);
        let publisher = Arc::clone(&mailbox);
        let expected = devices.len();

        let handle = std::thread::Builder::new()
            .name("gpu-poller".to_string())
            .spawn(move || loop {
                match query_smi() {
                    Ok(devices) if devices.len() == expected => {
                        publisher.put(devices);
                    }
                    Ok(devices) => {
                        debug!("nvidia-smi reported {} of {expected} devices", devices.len());
                    }
                    Err(e) => debug!("nvidia-smi poll failed: {e}"),
                }
                match stop_rx.recv_timeout(poll_interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("failed to start gpu poller, GPU readings will not update: {e}");
                None
            }
        };

        Some(Self {
            devices,
            mailbox,
            stop: Some(stop),
            handle,
        })
    }
}

impl GpuProvider for SmiGpu {
    fn names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }
    fn utilizations(&self) -> Vec<f32> {
        self.devices.iter().map(|d| d.utilization).collect()
    }
    fn vram_info(&self) -> Vec<(f64, f64)> {
        self.devices
            .iter()
            .map(|d| (d.vram_used_mb, d.vram_total_mb))
            .collect()
    }
    fn frequencies_mhz(&self) -> Vec<f64> {
        self.devices.iter().map(|d| d.frequency_mhz).collect()
    }
    fn temperatures_c(&self) -> Vec<f64> {
        self.devices.iter().map(|d| d.temperature_c).collect()
    }

    fn refresh(&mut self) {
        if let Some(devices) = self.mailbox.take() {
            self.devices = devices;
        }
    }

    fn backend(&self) -> &'static str {
        "nvidia-smi"
    }

    fn devices(&self) -> Vec<GpuDevice> {
        self.devices.clone()
    }
}

impl Drop for SmiGpu {
    fn drop(&mut self) {
        // Closing the channel wakes the poller out of its sleep.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(feature = "nvidia")]
mod nvml {
    use super::{GpuDevice, GpuProvider};
    use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};
    use nvml_wrapper::Nvml;

    /// NVML backend. Queries are in-process and fast, so `refresh` reads directly.
    pub struct NvmlGpu {
        nvml: Nvml,
        count: u32,
        devices: Vec<GpuDevice>,
    }

    impl NvmlGpu {
        pub fn init() -> Option<Self> {
            let nvml = Nvml::init().ok()?;
            let count = nvml.device_count().ok()?;
            if count == 0 {
                return None;
            }
            let mut gpu = Self {
                nvml,
                count,
                devices: Vec::new(),
            };
            gpu.refresh();
            Some(gpu)
        }

        fn read(&self, index: u32) -> GpuDevice {
            let Ok(device) = self.nvml.device_by_index(index) else {
                return GpuDevice {
                    name: format!("GPU {index}"),
                    ..GpuDevice::default()
                };
            };
            let (vram_used_mb, vram_total_mb) = device
                .memory_info()
                .map(|mem| {
                    (
                        mem.used as f64 / (1024.0 * 1024.0),
                        mem.total as f64 / (1024.0 * 1024.0),
                    )
                })
                .unwrap_or_default();
            GpuDevice {
                name: device.name().unwrap_or_else(|_| format!("GPU {index}")),
                utilization: device
                    .utilization_rates()
                    .map(|util| util.gpu as f32)
                    .unwrap_or(0.0),
                vram_used_mb,
                vram_total_mb,
                frequency_mhz: device
                    .clock_info(Clock::Graphics)
                    .map(f64::from)
                    .unwrap_or(0.0),
                temperature_c: device
                    .temperature(TemperatureSensor::Gpu)
                    .map(f64::from)
                    .unwrap_or(0.0),
            }
        }
    }

    impl GpuProvider for NvmlGpu {
        fn names(&self) -> Vec<String> {
            self.devices.iter().map(|d| d.name.clone()).collect()
        }
        fn utilizations(&self) -> Vec<f32> {
            self.devices.iter().map(|d| d.utilization).collect()
        }
        fn vram_info(&self) -> Vec<(f64, f64)> {
            self.devices
                .iter()
                .map(|d| (d.vram_used_mb, d.vram_total_mb))
                .collect()
        }
        fn frequencies_mhz(&self) -> Vec<f64> {
            self.devices.iter().map(|d| d.frequency_mhz).collect()
        }
        fn temperatures_c(&self) -> Vec<f64> {
            self.devices.iter().map(|d| d.temperature_c).collect()
        }

        fn refresh(&mut self) {
            self.devices = (0..self.count).map(|i| self.read(i)).collect();
        }

        fn backend(&self) -> &'static str {
            "nvml"
        }

        fn devices(&self) -> Vec<GpuDevice> {
            self.devices.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_smi_rows() {
        let output = "NVIDIA GeForce RTX 3080, 37, 2048, 10240, 1710, 64\n\
                      Tesla T4, [N/A], 15, 15360, 585, 41\n";
        let devices = parse_smi_csv(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "NVIDIA GeForce RTX 3080");
        assert_eq!(devices[0].utilization, 37.0);
        assert_eq!(devices[0].vram_total_mb, 10240.0);
        assert_eq!(devices[0].temperature_c, 64.0);
        assert_eq!(devices[1].utilization, 0.0);
        assert_eq!(devices[1].frequency_mhz, 585.0);
    }

    #[test]
    fn empty_output_means_no_devices() {
        assert!(parse_smi_csv("\n  \n").is_empty());
    }

    #[test]
    fn no_gpu_reports_nothing() {
        let gpu = NoGpu;
        assert!(gpu.devices().is_empty());
        assert!(gpu.temperatures_c().is_empty());
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let err = run_command(
            "sysvis-definitely-not-a-command",
            &[],
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(err, GpuError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_times_out() {
        let start = Instant::now();
        let err = run_command("sleep", &["5"], Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, GpuError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn output_larger_than_pipe_buffer_is_read() {
        let out = run_command("head", &["-c", "1000000", "/dev/zero"], COMMAND_TIMEOUT).unwrap();
        assert_eq!(out.len(), 1_000_000);
    }
}
