use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use school_finder::compare::{comparison_rows, format_distance, format_rating};
use school_finder::{
    display_list, BookmarkStore, CompareSet, QuickFilter, School, SearchSession, ViewConfig,
};
use std::collections::BTreeSet;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Results,
    Compare,
    Filters,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Results => Page::Compare,
            Page::Compare => Page::Filters,
            Page::Filters => Page::Results,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Results => Page::Filters,
            Page::Compare => Page::Results,
            Page::Filters => Page::Compare,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Results => "Results",
            Page::Compare => "Compare",
            Page::Filters => "Filters",
        }
    }
}

pub struct App {
    pub session: SearchSession,
    pub view: ViewConfig,
    pub bookmarks: BookmarkStore,
    pub bookmark_ids: BTreeSet<String>,
    pub compare: CompareSet,
    /// Current display list: session → bookmark restriction → filter → sort
    pub displayed: Vec<School>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    /// One-line feedback shown in the status bar
    pub message: Option<String>,
}

impl App {
    pub fn new(session: SearchSession, view: ViewConfig, bookmarks: BookmarkStore) -> Self {
        let bookmark_ids = bookmarks.load();
        let mut app = Self {
            session,
            view,
            bookmarks,
            bookmark_ids,
            compare: CompareSet::new(),
            displayed: Vec::new(),
            state: TableState::default(),
            current_page: Page::Results,
            show_detail: false,
            message: None,
        };
        app.refresh();
        app
    }

    /// Recompute the display list and keep the selection in range
    pub fn refresh(&mut self) {
        self.displayed = display_list(&self.session.schools, &self.view, &self.bookmark_ids);

        let selected = match self.state.selected() {
            _ if self.displayed.is_empty() => None,
            Some(i) => Some(i.min(self.displayed.len() - 1)),
            None => Some(0),
        };
        self.state.select(selected);
    }

    pub fn selected_school(&self) -> Option<&School> {
        self.state.selected().and_then(|i| self.displayed.get(i))
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn cycle_sort(&mut self) {
        self.view.sort = self.view.sort.next();
        self.message = Some(format!("Sorted by {}", self.view.sort.label()));
        self.refresh();
    }

    pub fn toggle_quick_filter(&mut self, filter: QuickFilter) {
        self.view.filters.toggle(filter);
        self.refresh();
    }

    pub fn clear_filters(&mut self) {
        self.view.filters.clear();
        self.message = Some("Filters cleared".to_string());
        self.refresh();
    }

    pub fn toggle_bookmarks_only(&mut self) {
        self.view.bookmarks_only = !self.view.bookmarks_only;
        self.refresh();
    }

    pub fn toggle_bookmark(&mut self) {
        let Some(id) = self.selected_school().map(|s| s.id.clone()) else {
            return;
        };
        let bookmarked = self.bookmarks.toggle(&id);
        self.bookmark_ids = self.bookmarks.load();
        self.message = Some(if bookmarked { "Bookmarked" } else { "Bookmark removed" }.to_string());
        self.refresh();
    }

    pub fn toggle_compare(&mut self) {
        let Some(id) = self.selected_school().map(|s| s.id.clone()) else {
            return;
        };
        self.message = Some(match self.compare.toggle(&id) {
            Ok(true) => format!("Added to compare ({}/{})", self.compare.len(), self.compare.limit()),
            Ok(false) => format!("Removed from compare ({}/{})", self.compare.len(), self.compare.limit()),
            Err(e) => e.to_string(),
        });
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.displayed.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.displayed.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.displayed.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map(|i| (i + 10).min(len - 1)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map(|i| i.saturating_sub(10)).unwrap_or(0);
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => app.next_page(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('s') => app.cycle_sort(),
                KeyCode::Char('1') => app.toggle_quick_filter(QuickFilter::AdhdSupport),
                KeyCode::Char('2') => app.toggle_quick_filter(QuickFilter::Iep),
                KeyCode::Char('3') => app.toggle_quick_filter(QuickFilter::Therapists),
                KeyCode::Char('4') => app.toggle_quick_filter(QuickFilter::SensoryFriendly),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Char('c') => app.clear_filters(),
                KeyCode::Char('b') => app.toggle_bookmark(),
                KeyCode::Char('f') => app.toggle_bookmarks_only(),
                KeyCode::Char('v') => app.toggle_compare(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home if !app.displayed.is_empty() => app.state.select(Some(0)),
                KeyCode::End if !app.displayed.is_empty() => {
                    app.state.select(Some(app.displayed.len() - 1))
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Results {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Results => render_table(f, chunks[1], app),
            Page::Compare => render_compare(f, chunks[1], app),
            Page::Filters => render_filters(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Results, Page::Compare, Page::Filters].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("{} in {}", app.session.request.query, app.session.request.location),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("{}/{} shown", app.displayed.len(), app.session.len()),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("★ {}", app.bookmark_ids.len()),
        Style::default().fg(Color::Yellow),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("⇄ {}/{}", app.compare.len(), app.compare.limit()),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn header_row<'a>(titles: impl IntoIterator<Item = String>) -> Row<'a> {
    let cells = titles.into_iter().map(|h| {
        Cell::from(h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(
        ["", "School", "Rating", "Tuition", "Distance", "Class", "Approach"]
            .iter()
            .map(|h| h.to_string()),
    );

    let rows = app.displayed.iter().map(|school| {
        let mut marks = String::new();
        marks.push(if app.bookmark_ids.contains(&school.id) { '★' } else { ' ' });
        marks.push(if app.compare.contains(&school.id) { '⇄' } else { ' ' });

        let status_color = match school.enrollment_status.as_str() {
            "Waitlist" => Color::Yellow,
            "Closed" => Color::Red,
            _ => Color::White,
        };

        Row::new(vec![
            Cell::from(marks).style(Style::default().fg(Color::Yellow)),
            Cell::from(truncate(&school.name, 34)).style(Style::default().fg(status_color)),
            Cell::from(format_rating(school)),
            Cell::from(truncate(&school.tuition_range, 36)),
            Cell::from(format_distance(school)),
            Cell::from(school.average_class_size.to_string()),
            Cell::from(truncate(&school.educational_approach, 20)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(36),
            Constraint::Length(7),
            Constraint::Length(38),
            Constraint::Length(13),
            Constraint::Length(6),
            Constraint::Length(22),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Schools - {} ", app.view.sort.label())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_compare(f: &mut Frame, area: Rect, app: &App) {
    let schools = app.compare.selected(&app.session.schools);

    if schools.is_empty() {
        let empty = Paragraph::new("  Select up to 4 schools with 'v' to compare them here")
            .block(Block::default().borders(Borders::ALL).title(" Compare Schools "));
        f.render_widget(empty, area);
        return;
    }

    let header = header_row(
        std::iter::once("Feature".to_string()).chain(schools.iter().map(|s| truncate(&s.name, 28))),
    );

    let rows = comparison_rows(&schools).into_iter().map(|row| {
        let mut cells = vec![Cell::from(row.label).style(Style::default().fg(Color::Cyan))];
        cells.extend(row.values.into_iter().map(|v| {
            let color = match v.as_str() {
                "Yes" => Color::Green,
                "No" => Color::Red,
                _ => Color::White,
            };
            Cell::from(truncate(&v, 28)).style(Style::default().fg(color))
        }));
        Row::new(cells).height(1)
    });

    let mut widths = vec![Constraint::Length(22)];
    widths.extend(schools.iter().map(|_| Constraint::Length(30)));

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Compare Schools "),
    );

    f.render_widget(table, area);
}

fn render_filters(f: &mut Frame, area: Rect, app: &App) {
    let filters = &app.view.filters;
    let key_style = Style::default().fg(Color::Yellow);

    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Quick Filters",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    for (i, (filter, active)) in filters.quick_filters().into_iter().enumerate() {
        content.push(Line::from(vec![
            Span::raw("  "),
            if active {
                Span::styled("[x] ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            } else {
                Span::raw("[ ] ")
            },
            Span::styled(format!("{}", i + 1), key_style),
            Span::raw(format!(". {}", filter.label())),
        ]));
    }

    let max_fee = if filters.tuition.1 == u64::MAX {
        "any".to_string()
    } else {
        format!("R{}", filters.tuition.1)
    };

    content.extend([
        Line::from(""),
        Line::from(format!("  Tuition:       R{} - {}", filters.tuition.0, max_fee)),
        Line::from(format!("  Max class:     {}", filters.max_class_size)),
        Line::from(format!(
            "  Approaches:    {}",
            if filters.educational_approaches.is_empty() {
                "any".to_string()
            } else {
                filters.educational_approaches.join(", ")
            }
        )),
        Line::from(format!("  Sort:          {}", app.view.sort.label())),
        Line::from(format!(
            "  Bookmarks:     {}",
            if app.view.bookmarks_only { "bookmarked only" } else { "all schools" }
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Hint: ", key_style.add_modifier(Modifier::ITALIC)),
            Span::styled("1-4", key_style),
            Span::raw(" toggle, "),
            Span::styled("s", key_style),
            Span::raw(" sort, "),
            Span::styled("f", key_style),
            Span::raw(" bookmarks only, "),
            Span::styled("c", key_style),
            Span::raw(" clear"),
        ]),
    ]);

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Filters "),
    );

    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let key_style = Style::default().fg(Color::Yellow);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.displayed.len()),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(message.clone(), Style::default().fg(Color::Green)));
    }

    for (key, label) in [
        ("Enter", " Details"),
        ("Tab", " Page"),
        ("b", " Bookmark"),
        ("v", " Compare"),
        ("s", " Sort"),
    ] {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, key_style));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let school = match app.selected_school() {
        Some(s) => s,
        None => {
            let no_selection = Paragraph::new("No school selected").block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" School Details "),
            );
            f.render_widget(no_selection, area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let section = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let field = |name: &str, value: String| {
        Line::from(vec![Span::styled(format!("  {}: ", name), label), Span::raw(value)])
    };
    let flag = |value: bool| if value { "Yes" } else { "No" }.to_string();

    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {}", school.name), section)),
        Line::from(""),
        field("Address", school.address.clone().unwrap_or_else(|| "Not listed".to_string())),
        field("Phone", school.phone_number.clone().unwrap_or_else(|| "Not listed".to_string())),
        field("Website", school.website.clone().unwrap_or_else(|| "Not listed".to_string())),
        field("Tuition", school.tuition_range.clone()),
    ];
    if let Some(url) = &school.fee_document_url {
        content.push(field("Fee document", url.clone()));
    }
    content.extend([
        field("Distance", format_distance(school)),
        field("Enrollment", school.enrollment_status.as_str().to_string()),
        Line::from(""),
        Line::from(Span::styled("  SUPPORT", section)),
        Line::from(""),
        field("ADHD", flag(school.adhd_support)),
        field("Autism", school.autism_support.label().to_string()),
        field("IEP/ISP", flag(school.offers_iep)),
        field("Therapists", flag(school.has_on_site_therapists)),
        field("Sensory", flag(school.has_sensory_friendly_facilities)),
        field("Programs", school.special_needs_programs.join(", ")),
        Line::from(""),
        Line::from(Span::styled("  ABOUT", section)),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                wrap_text(&school.brief_description, 35),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]),
    ]);

    if !school.parent_testimonials.is_empty() {
        content.push(Line::from(""));
        content.push(Line::from(Span::styled(
            format!("  TESTIMONIALS ({} avg)", format_rating(school)),
            section,
        )));
        for t in &school.parent_testimonials {
            content.push(Line::from(format!("  {} {}", "★".repeat(t.rating as usize), t.author)));
        }
    }

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" School Details "),
    );

    f.render_widget(detail_panel, area);
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() || current_line.len() + word.len() < width {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        } else {
            if !result.is_empty() {
                result.push_str("\n  ");
            }
            result.push_str(&current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        if !result.is_empty() {
            result.push_str("\n  ");
        }
        result.push_str(&current_line);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_finder::{SearchRequest, SortKey};

    fn app() -> App {
        let mut session = SearchSession::new(SearchRequest::new("remedial", "Parklands"), "static");
        for (name, km) in [("Oakley House", 6.0), ("Browns School", 3.5), ("La Vigne", 9.0)] {
            let mut school = School::new(name);
            school.distance_km = Some(km);
            session.schools.push(school);
        }
        App::new(session, ViewConfig::default(), BookmarkStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_cycle_sort_reorders() {
        let mut app = app();
        assert_eq!(app.view.sort, SortKey::Rating);
        app.cycle_sort();
        assert_eq!(app.view.sort, SortKey::Distance);
        assert_eq!(app.displayed[0].name, "Browns School");
    }

    #[test]
    fn test_bookmarks_only_view() {
        let mut app = app();
        app.toggle_bookmark();
        assert!(app.bookmark_ids.contains("oakley-house"));

        app.toggle_bookmarks_only();
        assert_eq!(app.displayed.len(), 1);
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_compare_limit_message() {
        let mut app = app();
        app.compare = CompareSet::new();
        for id in ["a", "b", "c", "d"] {
            app.compare.toggle(id).unwrap();
        }
        app.toggle_compare();
        assert_eq!(app.compare.len(), 4);
        assert!(app.message.as_deref().unwrap_or("").contains("up to 4"));
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_truncate_and_wrap() {
        assert_eq!(truncate("Browns School", 20), "Browns School");
        assert_eq!(truncate("Blouberg International School", 10), "Blouber...");
        assert_eq!(wrap_text("small classes and caring staff", 15), "small classes\n  and caring\n  staff");
    }
}
