use std::sync::Arc;

use decisionmaker::data::loader::LoadedData;

/// State for the column dialog, created when a file finishes loading and the
/// user needs to choose which column to analyse.
pub struct ColumnDialogState {
    pub loaded_data: Arc<LoadedData>,
    pub source: String,
    /// Indices into `loaded_data.columns` offered for analysis.
    pub candidates: Vec<usize>,
    /// Index into `candidates`.
    pub selected: usize,
}

impl ColumnDialogState {
    /// Offers the numeric-looking columns, or every column when none look
    /// numeric. `preferred` is preselected when it is offered.
    pub fn new(loaded_data: Arc<LoadedData>, source: String, preferred: Option<&str>) -> Self {
        let numeric = loaded_data.numeric_columns();
        let candidates = if numeric.is_empty() {
            (0..loaded_data.columns.len()).collect()
        } else {
            numeric
        };

        let selected = preferred
            .and_then(|name| {
                candidates
                    .iter()
                    .position(|&idx| loaded_data.columns[idx] == name)
            })
            .unwrap_or(0);

        Self {
            loaded_data,
            source,
            candidates,
            selected,
        }
    }

    pub fn selected_column(&self) -> Option<&str> {
        self.candidates
            .get(self.selected)
            .map(|&idx| self.loaded_data.columns[idx].as_str())
    }
}

pub enum ColumnDialogResult {
    Analyze(String),
    Cancel,
}

/// Show the column dialog. Returns `Some` when the user presses Analyze or
/// Cancel, `None` while the dialog is still open.
pub fn show_column_dialog(ctx: &egui::Context, state: &mut ColumnDialogState) -> Option<ColumnDialogResult> {
    let mut result = None;

    egui::Window::new("Select Column")
        .collapsible(false)
        .resizable(false)
        .default_width(420.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(
                egui::RichText::new(format!(
                    "{}: {} columns, {} rows.",
                    state.source,
                    state.loaded_data.columns.len(),
                    state.loaded_data.row_count,
                ))
                .weak(),
            );

            ui.add_space(12.0);
            ui.label(egui::RichText::new("Column to analyse").strong());
            ui.add_space(2.0);

            if state.candidates.is_empty() {
                ui.label(egui::RichText::new("The file has no columns.").weak());
            } else {
                let current = state.selected_column().unwrap_or_default().to_string();
                egui::ComboBox::from_id_salt("column_selector")
                    .selected_text(current)
                    .width(300.0)
                    .show_ui(ui, |ui| {
                        for (i, &col_idx) in state.candidates.iter().enumerate() {
                            ui.selectable_value(
                                &mut state.selected,
                                i,
                                &state.loaded_data.columns[col_idx],
                            );
                        }
                    });
            }

            ui.add_space(16.0);

            ui.horizontal(|ui| {
                let column = state.selected_column().map(str::to_string);
                let analyze_btn = ui.add_enabled(
                    column.is_some(),
                    egui::Button::new(egui::RichText::new("Analyze").strong())
                        .min_size(egui::vec2(100.0, 32.0)),
                );
                if analyze_btn.clicked() {
                    if let Some(column) = column {
                        result = Some(ColumnDialogResult::Analyze(column));
                    }
                }

                if ui
                    .add(egui::Button::new("Cancel").min_size(egui::vec2(100.0, 32.0)))
                    .clicked()
                {
                    result = Some(ColumnDialogResult::Cancel);
                }
            });
        });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use decisionmaker::data::loader::parse_csv;

    fn loaded() -> Arc<LoadedData> {
        Arc::new(parse_csv(b"name,views,clicks\na,10,1\nb,12,2\n").unwrap())
    }

    #[test]
    fn offers_numeric_columns() {
        let state = ColumnDialogState::new(loaded(), "test.csv".into(), None);
        assert_eq!(state.candidates, vec![1, 2]);
        assert_eq!(state.selected_column(), Some("views"));
    }

    #[test]
    fn preselects_previous_column() {
        let state = ColumnDialogState::new(loaded(), "test.csv".into(), Some("clicks"));
        assert_eq!(state.selected_column(), Some("clicks"));

        let state = ColumnDialogState::new(loaded(), "test.csv".into(), Some("name"));
        assert_eq!(state.selected_column(), Some("views"));
    }

    #[test]
    fn falls_back_to_every_column() {
        let text = Arc::new(parse_csv(b"a,b\nx,y\n").unwrap());
        let state = ColumnDialogState::new(text, "t.csv".into(), None);
        assert_eq!(state.candidates, vec![0, 1]);
    }
}
