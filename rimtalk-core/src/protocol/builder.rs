//! Builds the outbound message list from an instruction and history turns

use super::types::{Message, Role};
use crate::error::{ClientError, ClientResult};

/// A caller-supplied history turn: who spoke and what they said
pub type Turn = (Role, String);

/// Build the ordered message list for one request.
///
/// A non-empty `instruction` becomes the leading system message. History
/// turns may only be `User` or `Assistant`; a `System` turn is rejected
/// with [`ClientError::InvalidRole`] rather than being passed through.
pub fn build_messages(instruction: &str, turns: &[Turn]) -> ClientResult<Vec<Message>> {
    let mut messages = Vec::with_capacity(turns.len() + 1);

    if !instruction.is_empty() {
        messages.push(Message::system(instruction));
    }

    for (role, text) in turns {
        messages.push(Message {
            role: history_role(*role)?,
            content: text.clone(),
        });
    }

    Ok(messages)
}

fn history_role(role: Role) -> ClientResult<Role> {
    match role {
        Role::User | Role::Assistant => Ok(role),
        other => Err(ClientError::InvalidRole(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Role::User, "user" ; "user turn")]
    #[test_case(Role::Assistant, "assistant" ; "assistant turn")]
    fn test_history_roles_map_to_wire_names(role: Role, wire: &str) {
        let messages = build_messages("", &[(role, "text".to_string())]).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role.as_str(), wire);
    }

    #[test]
    fn test_instruction_is_prepended() {
        let turns = vec![
            (Role::User, "Hello".to_string()),
            (Role::Assistant, "Hi there".to_string()),
        ];
        let messages = build_messages("Stay in character.", &turns).unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::system("Stay in character."));
        assert_eq!(messages[1], Message::user("Hello"));
        assert_eq!(messages[2], Message::assistant("Hi there"));
    }

    #[test]
    fn test_empty_instruction_is_omitted() {
        let messages = build_messages("", &[(Role::User, "Hello".to_string())]).unwrap();
        assert_eq!(messages, vec![Message::user("Hello")]);
    }

    #[test]
    fn test_system_turn_fails_fast() {
        let turns = vec![
            (Role::User, "Hello".to_string()),
            (Role::System, "sneaky".to_string()),
        ];
        match build_messages("", &turns) {
            Err(ClientError::InvalidRole(Role::System)) => {}
            other => panic!("Expected InvalidRole, got {:?}", other),
        }
    }
}
