//! Relevance filter for extracted events.

use crate::models::{EventAction, ResourceEvent, ResourceType};

/// Decides whether an event is a task entering the target status.
///
/// An event is relevant when all of these hold:
/// - the resource is a task and the action is `changed`;
/// - the changed field, if the source names one, is the status field;
/// - the new status equals the target status (surrounding whitespace ignored).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    target_status: String,
    status_field: String,
}

impl EventFilter {
    /// Creates a filter for `target_status` changes on `status_field`.
    pub fn new(target_status: impl Into<String>, status_field: impl Into<String>) -> Self {
        Self {
            target_status: target_status.into().trim().to_string(),
            status_field: status_field.into().trim().to_string(),
        }
    }

    /// Returns the configured target status.
    pub fn target_status(&self) -> &str {
        &self.target_status
    }

    /// Returns true if `event` should be dispatched.
    pub fn is_relevant(&self, event: &ResourceEvent) -> bool {
        if event.resource_type != ResourceType::Task || event.action != EventAction::Changed {
            return false;
        }

        if event.changed_field.as_deref().is_some_and(|field| field != self.status_field) {
            return false;
        }

        event.new_status.as_deref().is_some_and(|status| status.trim() == self.target_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceId;

    fn filter() -> EventFilter {
        EventFilter::new("in analysis", "status")
    }

    fn task_change(new_status: Option<&str>, field: Option<&str>) -> ResourceEvent {
        ResourceEvent {
            resource_id: ResourceId::from("123"),
            resource_type: ResourceType::Task,
            action: EventAction::Changed,
            changed_field: field.map(str::to_string),
            new_status: new_status.map(str::to_string),
            occurred_at: None,
            position: 0,
        }
    }

    #[test]
    fn matches_task_entering_target_status() {
        assert!(filter().is_relevant(&task_change(Some("in analysis"), None)));
        assert!(filter().is_relevant(&task_change(Some(" in analysis "), Some("status"))));
    }

    #[test]
    fn rejects_other_statuses() {
        assert!(!filter().is_relevant(&task_change(Some("done"), None)));
        assert!(!filter().is_relevant(&task_change(Some("In Analysis"), None)));
        assert!(!filter().is_relevant(&task_change(None, None)));
    }

    #[test]
    fn rejects_changes_to_other_fields() {
        assert!(!filter().is_relevant(&task_change(Some("in analysis"), Some("name"))));
    }

    #[test]
    fn rejects_non_task_resources() {
        let mut event = task_change(Some("in analysis"), None);
        event.resource_type = ResourceType::Other("project".to_string());
        assert!(!filter().is_relevant(&event));
    }

    #[test]
    fn rejects_non_change_actions() {
        for action in [EventAction::Added, EventAction::Removed, EventAction::Undefined] {
            let mut event = task_change(Some("in analysis"), None);
            event.action = action;
            assert!(!filter().is_relevant(&event), "{action} should not match");
        }
    }

    #[test]
    fn target_is_trimmed() {
        let filter = EventFilter::new("  review ", "status");
        assert_eq!(filter.target_status(), "review");
        assert!(filter.is_relevant(&task_change(Some("review"), None)));
    }
}
