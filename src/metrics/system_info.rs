use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};

use super::cache::SystemInfoCache;

const CPU_MODEL_KEY: &str = "cpu_model";
const STATIC_FACTS_KEY: &str = "static_facts";

/// Strings some platforms report as the CPU "model" that are really the
/// architecture.
const ARCH_NAMES: [&str; 6] = ["x86_64", "i386", "i686", "amd64", "arm64", "aarch64"];

#[derive(Debug, Clone, PartialEq)]
pub struct DiskInfo {
    pub mount_point: String,
    pub file_system: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskInfo {
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 / self.total_bytes as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct StaticFacts {
    os_name: String,
    os_version: String,
    kernel_version: String,
    host_name: String,
    arch: String,
    logical_cores: usize,
}

/// Everything the System Info tab shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemInfo {
    pub cpu_model: String,
    pub logical_cores: usize,
    pub arch: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub host_name: String,
    pub total_memory: u64,
    pub available_memory: u64,
    pub total_swap: u64,
    pub disks: Vec<DiskInfo>,
    pub gpus: Vec<String>,
}

impl SystemInfo {
    /// Static facts come from `cache`; memory and disks are read fresh.
    pub fn gather(cache: &SystemInfoCache, gpus: Vec<String>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing())
                .with_memory(MemoryRefreshKind::everything()),
        );

        let facts: StaticFacts = cache.get_or_compute(STATIC_FACTS_KEY, || StaticFacts {
            os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::long_os_version().unwrap_or_default(),
            kernel_version: System::kernel_version().unwrap_or_default(),
            host_name: System::host_name().unwrap_or_default(),
            arch: System::cpu_arch(),
            logical_cores: system.cpus().len(),
        });

        let cpu_model = cpu_model_name(cache, &system);

        let disks = Disks::new_with_refreshed_list()
            .list()
            .iter()
            .map(|disk| DiskInfo {
                mount_point: disk.mount_point().to_string_lossy().into_owned(),
                file_system: disk.file_system().to_string_lossy().into_owned(),
                total_bytes: disk.total_space(),
                available_bytes: disk.available_space(),
            })
            .collect();

        Self {
            cpu_model,
            logical_cores: facts.logical_cores,
            arch: facts.arch,
            os_name: facts.os_name,
            os_version: facts.os_version,
            kernel_version: facts.kernel_version,
            host_name: facts.host_name,
            total_memory: system.total_memory(),
            available_memory: system.available_memory(),
            total_swap: system.total_swap(),
            disks,
            gpus,
        }
    }
}

/// CPU brand string, computed once per cache.
pub fn cpu_model_name(cache: &SystemInfoCache, system: &System) -> String {
    cache.get_or_compute(CPU_MODEL_KEY, || {
        let brand = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| is_model_name(brand));
        if let Some(brand) = brand {
            return brand;
        }

        #[cfg(target_os = "linux")]
        if let Some(model) = std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|contents| parse_cpuinfo_model(&contents))
        {
            return model;
        }

        format!("{} CPU", System::cpu_arch())
    })
}

fn is_model_name(name: &str) -> bool {
    !name.is_empty()
        && !ARCH_NAMES
            .iter()
            .any(|arch| name.eq_ignore_ascii_case(arch))
}

/// First `model name` line of `/proc/cpuinfo`.
pub fn parse_cpuinfo_model(contents: &str) -> Option<String> {
    contents
        .lines()
        .filter(|line| line.to_ascii_lowercase().starts_with("model name"))
        .filter_map(|line| line.split_once(':'))
        .map(|(_, model)| model.trim())
        .find(|model| is_model_name(model) && !model.starts_with("x86"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_model_from_cpuinfo() {
        let contents = "processor\t: 0\nvendor_id\t: GenuineIntel\n\
                        model name\t: Intel(R) Core(TM) i7-9700K CPU @ 3.60GHz\n";
        assert_eq!(
            parse_cpuinfo_model(contents).as_deref(),
            Some("Intel(R) Core(TM) i7-9700K CPU @ 3.60GHz")
        );
    }

    #[test]
    fn architecture_is_not_a_model() {
        assert_eq!(parse_cpuinfo_model("model name : x86_64\n"), None);
        assert!(!is_model_name("AArch64"));
        assert!(is_model_name("Apple M2"));
    }

    #[test]
    fn cached_model_is_not_recomputed() {
        let cache = SystemInfoCache::new();
        cache.set(CPU_MODEL_KEY, "Test CPU".to_string());
        assert_eq!(cpu_model_name(&cache, &System::new()), "Test CPU");
    }

    #[test]
    fn disk_usage_percent() {
        let disk = DiskInfo {
            mount_point: "/".into(),
            file_system: "ext4".into(),
            total_bytes: 200,
            available_bytes: 50,
        };
        assert_eq!(disk.used_percent(), 75.0);
    }
}
