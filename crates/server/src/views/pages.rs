use db::models::board::{BoardDetail, BoardSummary};
use services::services::session::SessionState;

use super::{Notice, attr, layout, text};

pub fn home(state: &SessionState) -> String {
    let actions = if state.is_authenticated() {
        r#"<a class="button button-lg" href="/boards">Go to Your Boards</a>"#
    } else {
        r#"<a class="button button-lg button-outline" href="/login">Login</a>
<a class="button button-lg" href="/register">Sign Up</a>"#
    };
    let body = format!(
        r#"<section class="hero">
<h1>Welcome to Stroflo!</h1>
<p>The intuitive Kanban board to streamline your workflow, manage tasks efficiently, and boost your productivity.</p>
<div class="actions">{actions}</div>
</section>"#
    );
    layout("Home", state, None, &body)
}

pub fn login(state: &SessionState, email: &str, notice: Option<&Notice>) -> String {
    let body = format!(
        r#"<section class="auth-card">
<h1>Login</h1>
<form method="post" action="/login">
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Login</button>
</form>
<p>No account yet? <a href="/register">Sign up</a></p>
</section>"#,
        email = attr(email),
    );
    layout("Login", state, notice, &body)
}

pub fn register(
    state: &SessionState,
    email: &str,
    name: &str,
    notice: Option<&Notice>,
) -> String {
    let body = format!(
        r#"<section class="auth-card">
<h1>Create an account</h1>
<form method="post" action="/register">
<label>Name <input type="text" name="name" value="{name}"></label>
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Password <input type="password" name="password" minlength="6" required></label>
<button type="submit">Sign Up</button>
</form>
<p>Already registered? <a href="/login">Login</a></p>
</section>"#,
        name = attr(name),
        email = attr(email),
    );
    layout("Sign Up", state, notice, &body)
}

pub fn boards(state: &SessionState, boards: &[BoardSummary], notice: Option<&Notice>) -> String {
    let items = if boards.is_empty() {
        r#"<p class="empty">No boards yet.</p>"#.to_string()
    } else {
        let rows: Vec<String> = boards
            .iter()
            .map(|summary| {
                let owner = summary
                    .owner
                    .as_ref()
                    .and_then(|o| o.display_name())
                    .unwrap_or("unknown");
                format!(
                    r#"<li><a href="/boards/{id}">{title}</a> <span class="meta">{owner} · {members} member(s)</span></li>"#,
                    id = summary.id,
                    title = text(&summary.title),
                    owner = text(owner),
                    members = summary.members.len(),
                )
            })
            .collect();
        format!(r#"<ul class="boards">{}</ul>"#, rows.join("\n"))
    };
    let body = format!("<h1>My Boards</h1>\n{items}");
    layout("My Boards", state, notice, &body)
}

pub fn board_detail(state: &SessionState, board: &BoardDetail) -> String {
    let lanes: Vec<String> = board
        .swim_lanes
        .iter()
        .map(|lane| {
            let cards: Vec<String> = lane
                .cards
                .iter()
                .map(|card| {
                    let assignee = card
                        .assigned_user
                        .as_ref()
                        .and_then(|u| u.display_name())
                        .map(|name| format!(r#" <span class="assignee">{}</span>"#, text(name)))
                        .unwrap_or_default();
                    let due = card
                        .need_by_date
                        .map(|d| format!(r#" <time datetime="{d}">{d}</time>"#))
                        .unwrap_or_default();
                    format!(
                        r#"<li class="card" data-card-id="{id}" data-position="{position}">{title}{assignee}{due}</li>"#,
                        id = card.id,
                        position = card.position,
                        title = text(&card.title),
                    )
                })
                .collect();
            format!(
                r#"<section class="lane" data-lane-id="{id}" data-position="{position}">
<h2>{title}</h2>
<ol class="cards">{cards}</ol>
</section>"#,
                id = lane.id,
                position = lane.position,
                title = text(&lane.title),
                cards = cards.join("\n"),
            )
        })
        .collect();

    let description = board
        .description
        .as_deref()
        .map(|d| format!(r#"<p class="description">{}</p>"#, text(d)))
        .unwrap_or_default();

    let body = format!(
        r#"<h1>{title}</h1>
{description}
<div class="lanes" data-board-id="{id}">
{lanes}
</div>"#,
        title = text(&board.title),
        id = board.id,
        lanes = lanes.join("\n"),
    );
    layout(&board.title, state, None, &body)
}

/// Page shell with only an error banner, for failed board loads.
pub fn error(state: &SessionState, title: &str, message: &str) -> String {
    layout(title, state, Some(&Notice::Error(message.to_string())), "")
}
