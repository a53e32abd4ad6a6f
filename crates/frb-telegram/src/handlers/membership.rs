use std::sync::Arc;

use teloxide::requests::ResponseResult;
use teloxide::types::{ChatMemberKind, ChatMemberUpdated};

use crate::router::AppState;

/// The bot was added to (or promoted in) a chat: remember it as a
/// notification destination. Removal is deliberately ignored; there is
/// no unsubscribe path.
pub async fn handle_my_chat_member(
    upd: ChatMemberUpdated,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let joined = matches!(
        upd.new_chat_member.kind,
        ChatMemberKind::Member | ChatMemberKind::Administrator(_)
    );
    if joined {
        super::register_chat(&state, super::core_chat(&upd.chat)).await;
    }
    Ok(())
}
