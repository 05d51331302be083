pub mod cache;
pub mod clock;
pub mod gpu;
pub mod mailbox;
pub mod process;
pub mod provider;
pub mod rate;
pub mod reference;
pub mod sampler;
pub mod series;
pub mod system_info;
pub mod units;

pub use cache::SystemInfoCache;
pub use clock::{IntervalGate, TickTimer};
pub use gpu::{detect_gpu_provider, GpuDevice, GpuProvider, NoGpu};
pub use mailbox::Mailbox;
pub use process::{
    AsyncProcessCollector, CollectError, ProcessRecord, ProcessSnapshot, ProcessSource,
    SysinfoProcessSource,
};
pub use provider::{DiskCounters, NetCounters, OsMetricsProvider, ProviderError, SysinfoProvider};
pub use rate::{Channel, CounterSnapshot, RateEstimator};
pub use reference::DecayingReferenceMax;
pub use sampler::{MetricsFrame, MetricsSampler, RateReading, SamplerConfig, SeriesSet};
pub use series::RollingSeriesBuffer;
pub use system_info::SystemInfo;
pub use units::DisplayUnit;
