use super::state::{ProcessView, TOP_PROCESSES};
use crate::metrics::ProcessRecord;

fn process_rows(ui: &mut egui::Ui, id: impl std::hash::Hash, processes: &[ProcessRecord], core: Option<usize>) {
    egui::Grid::new(id)
        .num_columns(6)
        .striped(true)
        .spacing([12.0, 2.0])
        .show(ui, |ui| {
            for heading in ["Name", "PID", "CPU %", "Mem %", "Threads", "Core"] {
                ui.label(egui::RichText::new(heading).strong());
            }
            ui.end_row();

            for process in processes {
                ui.label(&process.name);
                ui.monospace(process.pid.to_string());
                ui.monospace(format!("{:.1}", process.cpu_percent));
                ui.monospace(format!("{:.1}", process.memory_percent));
                ui.monospace(process.threads.to_string());
                ui.label(core.map_or_else(|| "any".to_string(), |core| core.to_string()));
                ui.end_row();
            }
        });
}

fn cpu_sum(processes: &[ProcessRecord]) -> f32 {
    processes.iter().map(|p| p.cpu_percent).sum()
}

impl ProcessView {
    /// Returns `true` when the search text changed.
    pub fn show(&mut self, ui: &mut egui::Ui) -> bool {
        let mut changed = false;
        ui.horizontal(|ui| {
            ui.label("Search:");
            changed = ui
                .add(egui::TextEdit::singleline(&mut self.search).hint_text("name or PID"))
                .changed();
            if !self.search.is_empty() && ui.small_button("❌").clicked() {
                self.search.clear();
                changed = true;
            }
        });

        if let Some(error) = &self.error {
            ui.colored_label(ui.visuals().warn_fg_color, format!("Last scan failed: {error}"));
        }

        let Some(snapshot) = &self.snapshot else {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Collecting processes…");
            });
            return changed;
        };

        ui.label(format!(
            "Processes: {}   Threads: {}",
            snapshot.process_count, snapshot.thread_count
        ));
        if let Some(updated_at) = self.updated_at {
            ui.label(
                egui::RichText::new(format!("updated {:.1} s ago", updated_at.elapsed().as_secs_f32()))
                    .small()
                    .weak(),
            );
        }
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            for core in 0..snapshot.core_processes.len() {
                let top = snapshot.top_on_core(core, TOP_PROCESSES);
                egui::CollapsingHeader::new(format!("CPU Core {core}  ({:.1} %)", cpu_sum(top)))
                    .id_salt(("core_node", core))
                    .default_open(true)
                    .show(ui, |ui| {
                        if top.is_empty() {
                            ui.label(egui::RichText::new("no pinned processes").weak());
                        } else {
                            process_rows(ui, ("core_rows", core), top, Some(core));
                        }
                    });
            }

            let top = snapshot.top_any_core(TOP_PROCESSES);
            egui::CollapsingHeader::new(format!(
                "All cores  ({} processes, top {:.1} %)",
                snapshot.any_core.len(),
                cpu_sum(top)
            ))
            .id_salt("any_core_node")
            .default_open(true)
            .show(ui, |ui| process_rows(ui, "any_core_rows", top, None));
        });

        changed
    }
}
