use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

pub const PLAN_MODE_INSTRUCTIONS: &str = include_str!("../../resources/plan_mode.md");
const PLAN_MODE_PROMPT_TEMPLATE: &str = include_str!("../../resources/plan_mode_prompt.md");

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PermissionMode {
    #[default]
    AutoEdit,
    Autonomous,
    Plan,
}

impl PermissionMode {
    /// Returns the wire label used for persistence and display.
    pub fn label(self) -> &'static str {
        match self {
            PermissionMode::AutoEdit => "auto_edit",
            PermissionMode::Autonomous => "autonomous",
            PermissionMode::Plan => "plan",
        }
    }

    /// Returns the user-facing label shown in the UI.
    pub fn display_label(self) -> &'static str {
        match self {
            PermissionMode::AutoEdit => "Auto Edit",
            PermissionMode::Autonomous => "Autonomous",
            PermissionMode::Plan => "Plan",
        }
    }

    /// Cycles to the next permission mode.
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            PermissionMode::AutoEdit => PermissionMode::Autonomous,
            PermissionMode::Autonomous => PermissionMode::Plan,
            PermissionMode::Plan => PermissionMode::AutoEdit,
        }
    }

    /// Transforms a prompt for the active permission mode.
    ///
    /// In `Plan` mode a concise instruction prefix and a labeled prompt
    /// delimiter are added for both initial and follow-up prompts so
    /// replies continue producing plan output instead of implementation.
    /// Other modes return the prompt unchanged.
    pub fn apply_to_prompt(self, prompt: &str, _is_initial_plan_prompt: bool) -> Cow<'_, str> {
        if self == PermissionMode::Plan {
            return Cow::Owned(Self::plan_mode_prompt(prompt));
        }

        Cow::Borrowed(prompt)
    }

    fn plan_mode_prompt(prompt: &str) -> String {
        PLAN_MODE_PROMPT_TEMPLATE
            .trim_end()
            .replace("{plan_mode_instructions}", PLAN_MODE_INSTRUCTIONS)
            .replace("{prompt}", prompt)
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto_edit" => Ok(PermissionMode::AutoEdit),
            "autonomous" => Ok(PermissionMode::Autonomous),
            "plan" => Ok(PermissionMode::Plan),
            _ => Err(format!("Unknown permission mode: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_to_prompt_wraps_initial_plan_prompt() {
        let prompt = "Create a migration";

        let transformed = PermissionMode::Plan.apply_to_prompt(prompt, true);

        assert!(transformed.contains("[PLAN MODE]"));
        assert!(transformed.contains(prompt));
    }

    #[test]
    fn test_apply_to_prompt_wraps_followup_plan_prompt() {
        let prompt = "Refine section 3";

        let transformed = PermissionMode::Plan.apply_to_prompt(prompt, false);

        assert!(transformed.contains("[PLAN MODE]"));
        assert!(transformed.contains(prompt));
    }

    #[test]
    fn test_apply_to_prompt_leaves_auto_edit_unchanged() {
        let prompt = "Fix the bug";

        let transformed = PermissionMode::AutoEdit.apply_to_prompt(prompt, false);

        assert_eq!(transformed, Cow::Borrowed(prompt));
    }

    #[test]
    fn test_toggle_cycles_through_all_modes() {
        assert_eq!(PermissionMode::AutoEdit.toggle(), PermissionMode::Autonomous);
        assert_eq!(PermissionMode::Autonomous.toggle(), PermissionMode::Plan);
        assert_eq!(PermissionMode::Plan.toggle(), PermissionMode::AutoEdit);
    }
}
