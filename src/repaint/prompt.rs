//! Instruction text sent alongside the photo.

use crate::repaint::types::ZoneDirective;

/// Role line that opens every instruction.
pub const ROLE_LINE: &str = "ROL: Expert en renderització fotorealista d'interiors...";

/// Builds the instruction for a directive set.
///
/// One `- <ZONE>: Color <color>` line per directive, in the given order.
/// Duplicates and conflicting colors are passed through untouched.
pub fn build_instruction(directives: &[ZoneDirective]) -> String {
    let mut prompt = String::with_capacity(ROLE_LINE.len() + 1 + directives.len() * 32);
    prompt.push_str(ROLE_LINE);
    prompt.push('\n');

    for directive in directives {
        prompt.push_str("- ");
        prompt.push_str(&directive.zone.to_uppercase());
        prompt.push_str(": Color ");
        prompt.push_str(&directive.color);
        prompt.push('\n');
    }

    prompt
}
