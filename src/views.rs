//! Views for Swirl Search
//! Query and results screens, plus the view-model the results screen renders

use egui::{Color32, RichText};

use crate::search::PaperRecord;
use crate::session::{QueryForm, SearchParams, SearchState};

pub const NO_ABSTRACT: &str = "No abstract available for this paper.";
pub const NO_RESULTS: &str = "No results found.";
pub const NO_LINK: &str = "No direct link available";
pub const LOADING: &str = "Fetching Papers...";

const ACCENT: Color32 = Color32::from_rgb(196, 160, 255);
const MUTED: Color32 = Color32::from_rgb(170, 165, 190);
const ERROR: Color32 = Color32::from_rgb(255, 110, 120);
const CARD_FILL: Color32 = Color32::from_rgba_premultiplied(18, 14, 36, 210);
const CARD_STROKE: Color32 = Color32::from_rgba_premultiplied(90, 70, 150, 160);

// ============================================================================
// Navigation
// ============================================================================

/// In-memory hand-off from the query screen to the results screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavState {
    pub query: Option<String>,
    pub num_papers: u32,
}

impl NavState {
    /// Search parameters carried by this state; `None` when the query is missing.
    pub fn params(&self) -> Option<SearchParams> {
        let query = self.query.as_deref()?.trim();
        if query.is_empty() {
            return None;
        }
        Some(SearchParams {
            query: query.to_string(),
            k: self.num_papers,
        })
    }
}

impl From<&SearchParams> for NavState {
    fn from(params: &SearchParams) -> Self {
        Self {
            query: Some(params.query.clone()),
            num_papers: params.k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Query,
    Results(NavState),
}

impl Route {
    /// Route to the results screen, or back to the query screen when the
    /// navigation state has no usable query.
    pub fn results(nav: NavState) -> Self {
        if nav.params().is_some() {
            Route::Results(nav)
        } else {
            Route::Query
        }
    }
}

// ============================================================================
// Results view-model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResultCard {
    pub title: String,
    /// Abstract text, or the placeholder when the paper has none
    pub abstract_text: String,
    pub has_abstract: bool,
    pub authors: Option<String>,
    pub link: Option<String>,
}

impl ResultCard {
    pub fn new(paper: &PaperRecord, viewer_base: &str) -> Self {
        Self {
            title: paper.title.clone(),
            abstract_text: paper
                .abstract_text
                .clone()
                .unwrap_or_else(|| NO_ABSTRACT.to_string()),
            has_abstract: paper.abstract_text.is_some(),
            authors: paper.authors.clone(),
            link: paper.link(viewer_base),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultsView {
    Loading,
    Failed(String),
    Empty,
    Papers(Vec<ResultCard>),
}

/// What the results screen should show for the current search state.
pub fn results_view(state: &SearchState, viewer_base: &str) -> ResultsView {
    if state.is_loading() {
        return ResultsView::Loading;
    }
    if let Some(error) = state.error() {
        return ResultsView::Failed(error.to_string());
    }
    if state.results().is_empty() {
        return ResultsView::Empty;
    }
    ResultsView::Papers(
        state
            .results()
            .iter()
            .map(|paper| ResultCard::new(paper, viewer_base))
            .collect(),
    )
}

// ============================================================================
// Screens
// ============================================================================

fn card_frame() -> egui::Frame {
    egui::Frame::none()
        .fill(CARD_FILL)
        .rounding(12.0)
        .inner_margin(egui::Margin::same(20.0))
        .stroke(egui::Stroke::new(1.0, CARD_STROKE))
}

/// Query screen. Returns true when the user submitted the form.
pub fn show_query_view(ctx: &egui::Context, form: &mut QueryForm, error: Option<&str>) -> bool {
    let mut submitted = false;

    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            let top = (ui.available_height() * 0.25).max(24.0);
            ui.add_space(top);

            ui.vertical_centered(|ui| {
                ui.label(
                    RichText::new("Semantic Search")
                        .size(44.0)
                        .strong()
                        .color(Color32::WHITE),
                );
                ui.label(
                    RichText::new("Find research papers instantly")
                        .size(18.0)
                        .color(MUTED),
                );
                ui.add_space(28.0);

                card_frame().show(ui, |ui| {
                    ui.set_max_width(480.0);

                    let query = ui.add(
                        egui::TextEdit::singleline(&mut form.query)
                            .hint_text("Enter your research topic...")
                            .desired_width(440.0),
                    );
                    ui.add_space(10.0);

                    ui.horizontal(|ui| {
                        ui.label(RichText::new("Number of papers").color(MUTED));
                        let count = ui.add(
                            egui::TextEdit::singleline(&mut form.count).desired_width(60.0),
                        );
                        let enter = ui.input(|i| i.key_pressed(egui::Key::Enter));
                        if (query.lost_focus() || count.lost_focus()) && enter {
                            submitted = true;
                        }
                    });
                    ui.add_space(12.0);

                    if ui
                        .add_sized([440.0, 32.0], egui::Button::new(RichText::new("Search").strong()))
                        .clicked()
                    {
                        submitted = true;
                    }

                    if let Some(error) = error {
                        ui.add_space(8.0);
                        ui.colored_label(ERROR, error);
                    }
                });
            });
        });

    submitted
}

/// Results screen. Returns true when the user asked to go back.
pub fn show_results_view(ctx: &egui::Context, nav: &NavState, view: &ResultsView) -> bool {
    let mut back = false;

    egui::CentralPanel::default()
        .frame(egui::Frame::none().inner_margin(egui::Margin::symmetric(32.0, 24.0)))
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Back").clicked() {
                    back = true;
                }
                ui.label(
                    RichText::new("Results")
                        .size(30.0)
                        .strong()
                        .color(Color32::WHITE),
                );
            });
            if let Some(query) = &nav.query {
                ui.label(
                    RichText::new(format!("\"{query}\", up to {} papers", nav.num_papers))
                        .color(MUTED),
                );
            }
            ui.add_space(16.0);

            match view {
                ResultsView::Loading => {
                    ui.vertical_centered(|ui| {
                        ui.add_space(40.0);
                        ui.spinner();
                        ui.label(RichText::new(LOADING).size(18.0).color(ACCENT));
                    });
                }
                ResultsView::Failed(message) => {
                    ui.colored_label(ERROR, message);
                }
                ResultsView::Empty => {
                    ui.label(RichText::new(NO_RESULTS).size(16.0).color(MUTED));
                }
                ResultsView::Papers(cards) => {
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            for card in cards {
                                show_card(ui, card);
                                ui.add_space(12.0);
                            }
                        });
                }
            }
        });

    back
}

fn show_card(ui: &mut egui::Ui, card: &ResultCard) {
    card_frame().show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.label(RichText::new(&card.title).size(20.0).strong().color(ACCENT));
        ui.add_space(6.0);

        ui.label(RichText::new("Abstract:").strong().color(Color32::WHITE));
        let text = RichText::new(&card.abstract_text);
        ui.label(if card.has_abstract { text } else { text.italics().color(MUTED) });

        if let Some(authors) = &card.authors {
            ui.add_space(4.0);
            ui.horizontal_wrapped(|ui| {
                ui.label(RichText::new("Authors:").strong().color(Color32::WHITE));
                ui.label(authors);
            });
        }

        ui.add_space(6.0);
        match &card.link {
            Some(url) => {
                ui.hyperlink_to("View Paper", url);
            }
            None => {
                ui.label(RichText::new(NO_LINK).italics().color(MUTED));
            }
        }
    });
}
