//! Prompt injection: tell the model which tags to wrap its reasoning in.
//!
//! [`cot_instruction`] renders the default instruction for a tag pair and
//! [`inject_instruction`] merges an instruction into a conversation's system
//! message. Both are pure; the input conversation is never modified.

use crate::{Message, MessageRole};

/// Separator placed between existing system content and the instruction.
const SYSTEM_SEPARATOR: &str = "\n\n";

/// Render the default instruction for the given tags.
///
/// The tags are interpolated verbatim so the model is asked to produce the
/// exact delimiters the splitter will search for.
///
/// ```
/// use ghostcot::prompt::cot_instruction;
///
/// let text = cot_instruction("<reason>", "</reason>");
/// assert!(text.contains("<reason>\nyour reasoning\n</reason>\n\nyour answer"));
/// ```
pub fn cot_instruction(start_tag: &str, end_tag: &str) -> String {
    format!(
        "\nCRITICAL: You MUST wrap your reasoning between {start_tag} and {end_tag} tags.\n\
         \n\
         Format:\n\
         {start_tag}\n\
         your reasoning\n\
         {end_tag}\n\
         \n\
         your answer\n"
    )
}

/// Return a copy of `messages` carrying `instruction` in its system message.
///
/// The first system message gets the instruction appended after a blank
/// line. Without a system message, a new one holding only the instruction is
/// inserted at the front. All other messages keep their content and order.
///
/// ```
/// use ghostcot::Message;
/// use ghostcot::prompt::inject_instruction;
///
/// let messages = vec![Message::system("A"), Message::user("hi")];
/// let injected = inject_instruction(&messages, "B");
/// assert_eq!(injected[0].content, "A\n\nB");
/// assert_eq!(injected.len(), 2);
/// ```
pub fn inject_instruction(messages: &[Message], instruction: &str) -> Vec<Message> {
    let mut injected = messages.to_vec();

    match injected
        .iter_mut()
        .find(|m| m.role == MessageRole::System)
    {
        Some(system) => {
            system.content.push_str(SYSTEM_SEPARATOR);
            system.content.push_str(instruction);
        }
        None => injected.insert(0, Message::system(instruction)),
    }

    injected
}
