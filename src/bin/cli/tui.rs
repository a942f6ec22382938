use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use orgdesk_lib::api::{ApiClient, AuditEntry, OrgKind, Person};
use orgdesk_lib::tree::{self, OrgNode};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::HashSet;

// ============================================================================
// TUI Mode
// ============================================================================

/// TUI operating mode
#[derive(Clone, Copy, PartialEq)]
enum TuiMode {
    Navigation, // Browsing the org tree
    Audit,      // Audit trail list
}

/// One visible row of the flattened tree
#[derive(Clone)]
struct TreeRow {
    id: String,
    name: String,
    kind: OrgKind,
    group_name: Option<String>,
    depth: usize,
    has_children: bool,
    is_expanded: bool,
}

/// TUI Application state
struct TuiApp {
    mode: TuiMode,

    // Tree data. The forest is rebuilt wholesale on every reload; only
    // `expanded` (record ids) survives, so open branches stay open.
    forest: Vec<OrgNode>,
    filtered: Vec<OrgNode>,
    expanded: HashSet<String>,
    visible: Vec<TreeRow>,
    list_state: ListState,

    // Persons, fetched once per reload for the detail pane
    persons: Vec<Person>,

    // Audit view
    audit: Vec<AuditEntry>,
    audit_state: ListState,

    // Search (overlay on Navigation)
    search_mode: bool,
    search_query: String,
    applied_filter: String,

    status_message: String,
}

impl TuiApp {
    fn new() -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            mode: TuiMode::Navigation,
            forest: Vec::new(),
            filtered: Vec::new(),
            expanded: HashSet::new(),
            visible: Vec::new(),
            list_state,
            persons: Vec::new(),
            audit: Vec::new(),
            audit_state: ListState::default(),
            search_mode: false,
            search_query: String::new(),
            applied_filter: String::new(),
            status_message: String::new(),
        }
    }

    /// Fetch records and rebuild the forest. Expanded ids survive.
    async fn reload(&mut self, client: &ApiClient) -> Result<(), String> {
        let records = client.list_orgs().await.map_err(|e| e.to_string())?;
        self.forest = tree::build_forest(&records);

        // Persons are only for the detail pane; an error there shouldn't
        // block tree browsing.
        self.persons = match client.list_persons(None).await {
            Ok(persons) => persons,
            Err(e) => {
                eprintln!("[Tui] Failed to load persons: {}", e);
                Vec::new()
            }
        };

        self.apply_filter();
        self.status_message = format!(
            "Loaded {} roots. / search, a audit, r reload, ? keys in footer, q quit",
            self.forest.len()
        );
        Ok(())
    }

    /// Re-run the filter over the current forest and reflatten.
    fn apply_filter(&mut self) {
        self.filtered = tree::filter_forest(&self.forest, &self.applied_filter);

        // A filtered view auto-expands the kept branches so matches are
        // visible without manual unfolding.
        if !self.applied_filter.is_empty() {
            fn collect_parents(nodes: &[OrgNode], expanded: &mut HashSet<String>) {
                for node in nodes {
                    if !node.children.is_empty() {
                        expanded.insert(node.record.id.clone());
                        collect_parents(&node.children, expanded);
                    }
                }
            }
            collect_parents(&self.filtered, &mut self.expanded);
        }

        self.update_visible();
    }

    /// Flatten the filtered forest into rows, descending only into
    /// expanded nodes.
    fn update_visible(&mut self) {
        fn walk(nodes: &[OrgNode], depth: usize, expanded: &HashSet<String>, out: &mut Vec<TreeRow>) {
            for node in nodes {
                let is_expanded = expanded.contains(&node.record.id);
                out.push(TreeRow {
                    id: node.record.id.clone(),
                    name: node.record.name.clone(),
                    kind: node.record.kind,
                    group_name: node.group_name.clone(),
                    depth,
                    has_children: !node.children.is_empty(),
                    is_expanded,
                });
                if is_expanded {
                    walk(&node.children, depth + 1, expanded, out);
                }
            }
        }

        self.visible.clear();
        walk(&self.filtered, 0, &self.expanded, &mut self.visible);

        // Keep the selection in range after a rebuild
        let selected = self.list_state.selected().unwrap_or(0);
        if self.visible.is_empty() {
            self.list_state.select(None);
        } else {
            self.list_state.select(Some(selected.min(self.visible.len() - 1)));
        }
    }

    fn selected_row(&self) -> Option<&TreeRow> {
        self.visible.get(self.list_state.selected()?)
    }

    fn toggle_expand(&mut self) {
        let Some(row) = self.selected_row() else { return };
        if !row.has_children {
            return;
        }
        let id = row.id.clone();
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
        self.update_visible();
    }

    fn move_selection(&mut self, delta: i64) {
        if self.visible.is_empty() {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as i64;
        let next = (current + delta).clamp(0, self.visible.len() as i64 - 1);
        self.list_state.select(Some(next as usize));
    }

    /// Find the selected node in the filtered forest for the detail pane.
    fn selected_node(&self) -> Option<&OrgNode> {
        let id = &self.selected_row()?.id;
        fn find<'a>(nodes: &'a [OrgNode], id: &str) -> Option<&'a OrgNode> {
            for node in nodes {
                if node.record.id == id {
                    return Some(node);
                }
                if let Some(found) = find(&node.children, id) {
                    return Some(found);
                }
            }
            None
        }
        find(&self.filtered, id)
    }

    /// Persons whose company reference matches the selected org.
    fn persons_at_selected(&self) -> Vec<&Person> {
        let Some(row) = self.selected_row() else {
            return Vec::new();
        };
        let Ok(org_id) = row.id.parse::<i64>() else {
            return Vec::new();
        };
        self.persons
            .iter()
            .filter(|p| p.company_id == Some(org_id))
            .collect()
    }
}

// ============================================================================
// Entry point and event loop
// ============================================================================

pub(crate) async fn run_tui(client: &ApiClient) -> Result<(), String> {
    // Setup terminal
    enable_raw_mode().map_err(|e| e.to_string())?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture).map_err(|e| e.to_string())?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| e.to_string())?;

    // Create app and load data
    let mut app = TuiApp::new();
    let load_result = app.reload(client).await;

    let result = match load_result {
        Ok(()) => run_tui_loop(&mut terminal, &mut app, client).await,
        Err(e) => Err(e),
    };

    // Restore terminal
    disable_raw_mode().map_err(|e| e.to_string())?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .map_err(|e| e.to_string())?;
    terminal.show_cursor().map_err(|e| e.to_string())?;

    result
}

async fn run_tui_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut TuiApp,
    client: &ApiClient,
) -> Result<(), String> {
    loop {
        // Draw UI
        terminal.draw(|f| draw_ui(f, app)).map_err(|e| e.to_string())?;

        // Handle input. Reloads are awaited in place, so a second fetch for
        // the same list can never be in flight.
        if event::poll(std::time::Duration::from_millis(100)).map_err(|e| e.to_string())? {
            if let Event::Key(key) = event::read().map_err(|e| e.to_string())? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Search overlay (on Navigation)
                if app.search_mode {
                    match key.code {
                        KeyCode::Esc => {
                            app.search_mode = false;
                            app.search_query.clear();
                            app.status_message = "Search cancelled".to_string();
                        }
                        KeyCode::Enter => {
                            app.search_mode = false;
                            app.applied_filter = app.search_query.clone();
                            app.search_query.clear();
                            app.apply_filter();
                            app.status_message = if app.applied_filter.is_empty() {
                                "Filter cleared".to_string()
                            } else {
                                format!(
                                    "Filter '{}': {} rows (Esc to clear)",
                                    app.applied_filter,
                                    app.visible.len()
                                )
                            };
                        }
                        KeyCode::Backspace => {
                            app.search_query.pop();
                        }
                        KeyCode::Char(c) => {
                            app.search_query.push(c);
                        }
                        _ => {}
                    }
                    continue;
                }

                match app.mode {
                    TuiMode::Navigation => match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char('j') | KeyCode::Down => app.move_selection(1),
                        KeyCode::Char('k') | KeyCode::Up => app.move_selection(-1),
                        KeyCode::PageDown => app.move_selection(10),
                        KeyCode::PageUp => app.move_selection(-10),
                        KeyCode::Enter | KeyCode::Char(' ') => app.toggle_expand(),
                        KeyCode::Char('/') => {
                            app.search_mode = true;
                            app.search_query.clear();
                            app.status_message =
                                "Search: type a term, Enter to filter, Esc to cancel".to_string();
                        }
                        KeyCode::Esc => {
                            if !app.applied_filter.is_empty() {
                                app.applied_filter.clear();
                                app.apply_filter();
                                app.status_message = "Filter cleared".to_string();
                            }
                        }
                        KeyCode::Char('r') => {
                            app.status_message = "Reloading...".to_string();
                            match app.reload(client).await {
                                Ok(()) => {
                                    app.status_message =
                                        format!("Reloaded, {} rows", app.visible.len());
                                }
                                Err(e) => {
                                    app.status_message = format!("Reload failed: {}", e);
                                }
                            }
                        }
                        KeyCode::Char('a') => {
                            match client.list_audit(100).await {
                                Ok(entries) => {
                                    app.audit = entries;
                                    app.audit_state.select(if app.audit.is_empty() {
                                        None
                                    } else {
                                        Some(0)
                                    });
                                    app.mode = TuiMode::Audit;
                                    app.status_message = format!(
                                        "Audit trail: {} entries (Esc to go back)",
                                        app.audit.len()
                                    );
                                }
                                Err(e) => {
                                    app.status_message = format!("Audit load failed: {}", e);
                                }
                            }
                        }
                        _ => {}
                    },
                    TuiMode::Audit => match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Esc => {
                            app.mode = TuiMode::Navigation;
                            app.status_message = "Back to navigation".to_string();
                        }
                        KeyCode::Char('j') | KeyCode::Down => {
                            let selected = app.audit_state.selected().unwrap_or(0);
                            if selected + 1 < app.audit.len() {
                                app.audit_state.select(Some(selected + 1));
                            }
                        }
                        KeyCode::Char('k') | KeyCode::Up => {
                            let selected = app.audit_state.selected().unwrap_or(0);
                            app.audit_state.select(Some(selected.saturating_sub(1)));
                        }
                        _ => {}
                    },
                }
            }
        }
    }
}

// ============================================================================
// Drawing
// ============================================================================

fn draw_ui(f: &mut Frame, app: &mut TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.size());

    match app.mode {
        TuiMode::Navigation => draw_navigation(f, app, chunks[0]),
        TuiMode::Audit => draw_audit(f, app, chunks[0]),
    }

    draw_status(f, app, chunks[1]);
}

fn draw_navigation(f: &mut Frame, app: &mut TuiApp, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    draw_tree(f, app, columns[0]);
    draw_detail(f, app, columns[1]);
}

fn draw_tree(f: &mut Frame, app: &mut TuiApp, area: Rect) {
    let items: Vec<ListItem> = app
        .visible
        .iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            let marker = if row.has_children {
                if row.is_expanded { "▾ " } else { "▸ " }
            } else {
                "  "
            };
            let mut spans = vec![
                Span::raw(format!("{}{}", indent, marker)),
                Span::styled(
                    row.name.clone(),
                    match row.kind {
                        OrgKind::Company => Style::default().fg(Color::White),
                        OrgKind::Division => Style::default().fg(Color::Gray),
                        OrgKind::Group => Style::default().fg(Color::Magenta),
                    },
                ),
            ];
            if let Some(group) = &row.group_name {
                spans.push(Span::styled(
                    format!("  ({})", group),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = if app.search_mode {
        format!(" Organizations — search: {}_ ", app.search_query)
    } else if !app.applied_filter.is_empty() {
        format!(" Organizations — filter: {} ", app.applied_filter)
    } else {
        " Organizations ".to_string()
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn draw_detail(f: &mut Frame, app: &TuiApp, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    if let Some(node) = app.selected_node() {
        let rec = &node.record;
        lines.push(Line::from(Span::styled(
            rec.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(format!("kind: {}", rec.kind.as_str())));
        if let Some(short) = &rec.short_name {
            lines.push(Line::from(format!("short name: {}", short)));
        }
        if let Some(group) = &node.group_name {
            lines.push(Line::from(format!("group: {}", group)));
        }
        if let Some(industry) = &rec.industry {
            lines.push(Line::from(format!("industry: {}", industry)));
        }
        if let Some(city) = &rec.city {
            lines.push(Line::from(format!("city: {}", city)));
        }
        lines.push(Line::from(format!("divisions: {}", node.children.len())));

        let persons = app.persons_at_selected();
        if !persons.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("People ({})", persons.len()),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for p in persons.iter().take(20) {
                let title = p
                    .title
                    .as_deref()
                    .map(|t| format!(" — {}", t))
                    .unwrap_or_default();
                lines.push(Line::from(format!("  {}{}", p.full_name(), title)));
            }
        }
    } else {
        lines.push(Line::from("No selection"));
    }

    let detail = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Details "))
        .wrap(Wrap { trim: false });
    f.render_widget(detail, area);
}

fn draw_audit(f: &mut Frame, app: &mut TuiApp, area: Rect) {
    let items: Vec<ListItem> = app
        .audit
        .iter()
        .map(|e| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    e.occurred_at.format("%Y-%m-%d %H:%M ").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:8} ", e.action),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(format!("{} {} ", e.entity_kind, e.entity_id)),
                Span::styled(
                    format!("by {}", e.actor.as_deref().unwrap_or("system")),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Audit trail "))
        .highlight_style(Style::default().bg(Color::DarkGray));

    f.render_stateful_widget(list, area, &mut app.audit_state);
}

fn draw_status(f: &mut Frame, app: &TuiApp, area: Rect) {
    let status = Paragraph::new(app.status_message.clone())
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgdesk_lib::api::OrgRecord;

    fn rec(id: &str, name: &str, kind: OrgKind, parent: Option<&str>) -> OrgRecord {
        OrgRecord {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            parent_id: parent.map(|p| p.to_string()),
            short_name: None,
            industry: None,
            city: None,
        }
    }

    fn app_with(records: Vec<OrgRecord>) -> TuiApp {
        let mut app = TuiApp::new();
        app.forest = tree::build_forest(&records);
        app.apply_filter();
        app
    }

    #[test]
    fn test_collapsed_children_are_hidden() {
        let app = app_with(vec![
            rec("1", "Acme", OrgKind::Company, None),
            rec("2", "Sales", OrgKind::Division, Some("1")),
        ]);
        let names: Vec<&str> = app.visible.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Acme"]);
    }

    #[test]
    fn test_expanded_set_survives_rebuild() {
        let records = vec![
            rec("1", "Acme", OrgKind::Company, None),
            rec("2", "Sales", OrgKind::Division, Some("1")),
        ];
        let mut app = app_with(records.clone());
        app.list_state.select(Some(0));
        app.toggle_expand();
        assert_eq!(app.visible.len(), 2);

        // Simulate a reload: fresh forest, same expanded set.
        app.forest = tree::build_forest(&records);
        app.apply_filter();
        let names: Vec<&str> = app.visible.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Sales"]);
    }

    #[test]
    fn test_filter_auto_expands_match_ancestors() {
        let mut app = app_with(vec![
            rec("1", "Acme", OrgKind::Company, None),
            rec("2", "Sales", OrgKind::Division, Some("1")),
            rec("3", "Sales East", OrgKind::Division, Some("2")),
            rec("4", "Beta", OrgKind::Company, None),
        ]);
        app.applied_filter = "east".to_string();
        app.apply_filter();
        let names: Vec<&str> = app.visible.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Sales", "Sales East"]);
    }

    #[test]
    fn test_selection_clamped_after_filter_shrinks_rows() {
        let mut app = app_with(vec![
            rec("1", "Acme", OrgKind::Company, None),
            rec("2", "Beta", OrgKind::Company, None),
            rec("3", "Gamma", OrgKind::Company, None),
        ]);
        app.list_state.select(Some(2));
        app.applied_filter = "acme".to_string();
        app.apply_filter();
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn test_leaf_toggle_is_a_no_op() {
        let mut app = app_with(vec![rec("1", "Acme", OrgKind::Company, None)]);
        app.list_state.select(Some(0));
        app.toggle_expand();
        assert_eq!(app.visible.len(), 1);
        assert!(app.expanded.is_empty());
    }
}
