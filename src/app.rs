use std::time::{Duration, Instant};

use log::info;

use crate::components::process_view::ProcessView;
use crate::components::settings::{show_settings_window, Settings};
use crate::components::{dashboard, resource_view, system_info, toolbar};
use crate::metrics::{
    detect_gpu_provider, AsyncProcessCollector, IntervalGate, MetricsFrame, MetricsSampler,
    SysinfoProcessSource, SysinfoProvider, SystemInfo, SystemInfoCache, TickTimer,
};

/// Shortest wait between repaints, so the UI stays responsive to input.
const MIN_REPAINT: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Cpu,
    Memory,
    Network,
    Disk,
    Gpu,
    Processes,
    SystemInfo,
}

impl Tab {
    pub const ALL: [Tab; 8] = [
        Tab::Dashboard,
        Tab::Cpu,
        Tab::Memory,
        Tab::Network,
        Tab::Disk,
        Tab::Gpu,
        Tab::Processes,
        Tab::SystemInfo,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Cpu => "CPU",
            Tab::Memory => "Memory",
            Tab::Network => "Network",
            Tab::Disk => "Disk",
            Tab::Gpu => "GPU",
            Tab::Processes => "Processes",
            Tab::SystemInfo => "System Info",
        }
    }
}

pub struct SystemMonitorApp {
    settings: Settings,
    applied: Settings,
    sampler: MetricsSampler<SysinfoProvider>,
    collector: AsyncProcessCollector<SysinfoProcessSource>,
    timer: TickTimer,
    process_gate: IntervalGate,
    paused: bool,
    tab: Tab,
    frame: MetricsFrame,
    process_view: ProcessView,
    info_cache: SystemInfoCache,
    system_info: SystemInfo,
}

impl SystemMonitorApp {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings) -> Self {
        settings.apply(&cc.egui_ctx);

        let gpu = detect_gpu_provider(settings.gpu_poll());
        let sampler = MetricsSampler::new(SysinfoProvider::new(), gpu, settings.sampler_config());
        let collector = AsyncProcessCollector::new(SysinfoProcessSource::new());
        let info_cache = SystemInfoCache::new();
        let system_info = SystemInfo::gather(&info_cache, sampler.gpu_names());
        info!(
            "monitoring {} cores ({}), gpu backend: {}",
            sampler.provider().core_count(),
            system_info.cpu_model,
            sampler.gpu_backend()
        );

        Self {
            timer: TickTimer::new(settings.sample_interval()),
            process_gate: IntervalGate::new(settings.process_refresh()),
            applied: settings.clone(),
            settings,
            sampler,
            collector,
            paused: false,
            tab: Tab::Dashboard,
            frame: MetricsFrame::default(),
            process_view: ProcessView::default(),
            info_cache,
            system_info,
        }
    }

    fn tick(&mut self, dt: Duration, now: Instant) {
        self.frame = self.sampler.sample_at(dt.as_secs_f64(), now);

        if self.process_gate.advance(dt) {
            let n_cores = self.sampler.provider().core_count();
            self.collector
                .start_collection(n_cores, &self.process_view.filter());
        }
    }

    /// Pushes edits made in the toolbar or settings window to the components
    /// that own the affected state.
    fn apply_settings(&mut self, ctx: &egui::Context) {
        if self.settings == self.applied {
            return;
        }
        let (new, old) = (&self.settings, &self.applied);

        if new.sample_interval_ms != old.sample_interval_ms {
            self.timer.set_interval(new.sample_interval());
        }
        if new.gpu_refresh_ms != old.gpu_refresh_ms {
            self.sampler.set_gpu_refresh_interval(new.gpu_refresh());
        }
        if new.process_refresh_ms != old.process_refresh_ms {
            self.process_gate.set_interval(new.process_refresh());
        }
        if new.display_unit != old.display_unit {
            self.sampler.set_display_unit(new.display_unit);
            info!("display unit set to {}", new.display_unit.label());
        }
        if new.history_len != old.history_len || new.core_history_len != old.core_history_len {
            self.sampler
                .set_history_len(new.history_len, new.core_history_len);
        }
        if new.scale != old.scale || new.font_size != old.font_size {
            new.apply(ctx);
        }

        self.applied = self.settings.clone();
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (pause, quit) = ctx.input(|i| (i.key_pressed(egui::Key::P), i.key_pressed(egui::Key::Escape)));
        if pause {
            self.paused = !self.paused;
        }
        if quit {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn select_tab(&mut self, tab: Tab) {
        if tab == self.tab {
            return;
        }
        if tab == Tab::SystemInfo {
            self.system_info = SystemInfo::gather(&self.info_cache, self.sampler.gpu_names());
        }
        if tab == Tab::Processes {
            self.process_gate.force();
        }
        self.tab = tab;
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if self.paused {
                ui.colored_label(ui.visuals().warn_fg_color, "⏸ Paused");
            } else {
                ui.label(format!("Sampling every {} ms", self.settings.sample_interval_ms));
            }
            if self.collector.is_collecting() {
                ui.separator();
                ui.spinner();
            }
            let failing = self.sampler.failing_channels();
            if !failing.is_empty() {
                ui.separator();
                ui.colored_label(
                    ui.visuals().warn_fg_color,
                    format!("Unavailable: {}", failing.join(", ")),
                );
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("GPU: {}", self.sampler.gpu_backend()));
            });
        });
    }
}

impl eframe::App for SystemMonitorApp {
    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_shortcuts(ctx);

        // The timer restarts on every due tick; while paused the elapsed time
        // is dropped. Rates are measured against `now`.
        let now = Instant::now();
        if let Some(dt) = self.timer.poll_at(now) {
            if !self.paused {
                self.tick(dt, now);
            }
        }
        if let Some(result) = self.collector.get_result() {
            self.process_view.apply_result(result);
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.add_space(16.0);
                egui::widgets::global_theme_preference_buttons(ui);

                ui.add_space(16.0);
                if ui.button("⚙").clicked() {
                    self.settings.show();
                }
            });
            toolbar::show_toolbar(ui, &mut self.settings, &mut self.paused);
            ui.add_space(2.0);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| self.status_bar(ui));

        show_settings_window(ctx, &mut self.settings);
        self.apply_settings(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let mut selected = self.tab;
            ui.horizontal(|ui| {
                for tab in Tab::ALL {
                    ui.selectable_value(&mut selected, tab, tab.title());
                }
            });
            self.select_tab(selected);
            ui.separator();

            let series = self.sampler.series();
            let cpu_model = self.system_info.cpu_model.as_str();
            match self.tab {
                Tab::Dashboard => dashboard::show_dashboard(ui, &self.frame, series, cpu_model),
                Tab::Cpu => resource_view::show_cpu(ui, &self.frame, series, cpu_model),
                Tab::Memory => resource_view::show_memory(ui, &self.frame, series),
                Tab::Network => resource_view::show_network(ui, &self.frame, series),
                Tab::Disk => resource_view::show_disk(ui, &self.frame, series),
                Tab::Gpu => {
                    resource_view::show_gpu(ui, &self.frame, series, self.sampler.gpu_backend())
                }
                Tab::Processes => {
                    if self.process_view.show(ui) {
                        self.process_gate.force();
                    }
                }
                Tab::SystemInfo => system_info::show_system_info(ui, &self.system_info),
            }
        });

        ctx.request_repaint_after(self.timer.remaining_at(Instant::now()).max(MIN_REPAINT));
    }
}
