use std::{fs, path::PathBuf};

use anyhow::{Context, bail};
use ts_rs::TS;

const HEADER: &str = "// This file was generated by `cargo run --bin generate_types`.\n\
// Do not edit it by hand; change the Rust types and regenerate.\n\n";

fn output_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared/types.ts")
}

fn generate_types_content() -> String {
    let decls = [
        db::models::board::Board::decl(),
        db::models::board::CreateBoard::decl(),
        db::models::board::UpdateBoard::decl(),
        db::models::board::BoardSummary::decl(),
        db::models::board::BoardDetail::decl(),
        db::models::board_member::MemberRole::decl(),
        db::models::board_member::BoardMember::decl(),
        db::models::board_member::BoardMemberWithUser::decl(),
        db::models::board_member::AddBoardMember::decl(),
        db::models::board_member::UpdateMemberRole::decl(),
        db::models::swim_lane::SwimLane::decl(),
        db::models::swim_lane::CreateSwimLane::decl(),
        db::models::swim_lane::UpdateSwimLane::decl(),
        db::models::swim_lane::SwimLaneWithCards::decl(),
        db::models::card::Card::decl(),
        db::models::card::CreateCard::decl(),
        db::models::card::UpdateCard::decl(),
        db::models::card::CardWithAssignee::decl(),
        db::models::card_history::CardHistory::decl(),
        db::models::card_history::CardHistoryWithUser::decl(),
        db::models::user::UserProfile::decl(),
        db::models::user::UpdateUserProfile::decl(),
        db::models::position::PositionTable::decl(),
        db::models::position::PositionUpdate::decl(),
        db::models::position::PositionAck::decl(),
        db::models::position::FailureReason::decl(),
        db::models::position::PositionFailure::decl(),
        services::services::session::SessionPhase::decl(),
        services::services::reconciler::ReorderOutcome::decl(),
        services::services::reconciler::plan::Sibling::decl(),
        server::routes::boards::NewSwimLane::decl(),
        server::routes::boards::OrderRequest::decl(),
        server::routes::swim_lanes::MoveSwimLane::decl(),
        server::routes::swim_lanes::NewCard::decl(),
        server::routes::cards::MoveCard::decl(),
        server::routes::positions::PositionBatch::decl(),
    ];

    let body = decls
        .iter()
        .map(|decl| {
            let decl = decl.trim_start();
            if decl.starts_with("export") {
                decl.to_string()
            } else {
                format!("export {decl}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{HEADER}{body}\n")
}

fn main() -> anyhow::Result<()> {
    let check = std::env::args().any(|arg| arg == "--check");
    let path = output_path();
    let content = generate_types_content();

    if check {
        let current = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if current != content {
            bail!(
                "{} is out of date; run `cargo run --bin generate_types`",
                path.display()
            );
        }
        println!("{} is up to date", path.display());
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_declaration_is_exported() {
        let content = generate_types_content();
        assert!(content.starts_with(HEADER));
        for name in ["SwimLane", "CardWithAssignee", "SessionPhase", "PositionBatch"] {
            assert!(
                content.contains(&format!("export type {name} ")),
                "missing {name}"
            );
        }
        assert!(!content.lines().any(|l| l.starts_with("type ")));
    }

    #[test]
    fn test_versions_are_plain_numbers() {
        let content = generate_types_content();
        assert!(!content.contains("bigint"));
    }
}
