//! An ordered template of action labels.

use serde::{Deserialize, Serialize};

/// Ordered action labels with a cursor to the next step to execute.
///
/// Behavior codelets match the whole sequence against the trailing action
/// history; the planning path executes it one step at a time.
///
/// # Example
///
/// ```
/// use meca::models::ActionSequencePlan;
///
/// let mut plan = ActionSequencePlan::new(["Test1", "Test2"]);
/// assert_eq!(plan.current_step(), Some("Test1"));
/// plan.advance();
/// assert_eq!(plan.current_step(), Some("Test2"));
/// plan.advance();
/// assert!(plan.is_complete());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSequencePlan {
    steps: Vec<String>,
    #[serde(default)]
    cursor: usize,
}

impl ActionSequencePlan {
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
            cursor: 0,
        }
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The next label to execute, `None` once the plan is complete.
    pub fn current_step(&self) -> Option<&str> {
        self.steps.get(self.cursor).map(String::as_str)
    }

    /// Move to the next step and return it.
    pub fn advance(&mut self) -> Option<&str> {
        if self.cursor < self.steps.len() {
            self.cursor += 1;
        }
        self.current_step()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Whether `observed` ends with exactly this plan's steps, in order.
    /// An empty plan matches nothing.
    pub fn matches_tail<S: AsRef<str>>(&self, observed: &[S]) -> bool {
        if self.steps.is_empty() || observed.len() < self.steps.len() {
            return false;
        }
        let tail = &observed[observed.len() - self.steps.len()..];
        tail.iter()
            .zip(&self.steps)
            .all(|(seen, step)| seen.as_ref() == step)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_matches_tail_in_order() {
        let plan = ActionSequencePlan::new(["Test1", "Test2"]);
        assert!(plan.matches_tail(&["Test1", "Test2"]));
        assert!(plan.matches_tail(&["Other", "Test1", "Test2"]));
        assert!(!plan.matches_tail(&["Test2", "Test1"]));
        assert!(!plan.matches_tail(&["Test1", "Test2", "Other"]));
        assert!(!plan.matches_tail(&["Test2"]));
    }

    #[test]
    fn test_empty_plan_matches_nothing() {
        let plan = ActionSequencePlan::new(Vec::<String>::new());
        assert!(plan.is_empty());
        assert!(plan.is_complete());
        assert!(!plan.matches_tail(&["Test1"]));
        assert!(!plan.matches_tail::<&str>(&[]));
    }

    #[test]
    fn test_plan_cursor() {
        let mut plan = ActionSequencePlan::new(["a", "b"]);
        assert_eq!(plan.cursor(), 0);
        assert_eq!(plan.advance(), Some("b"));
        assert_eq!(plan.advance(), None);
        assert_eq!(plan.advance(), None);
        assert_eq!(plan.cursor(), 2);
        plan.reset();
        assert_eq!(plan.current_step(), Some("a"));
    }

    #[test]
    fn test_plan_json_shape() {
        let plan: ActionSequencePlan =
            serde_json::from_value(serde_json::json!({"steps": ["x", "y"]})).unwrap();
        assert_eq!(plan.current_step(), Some("x"));
        assert_eq!(plan.len(), 2);
    }
}
