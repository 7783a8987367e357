//! The capability model.
//!
//! Pure function: `(actor, workflow, capability) -> allowed`. No implicit
//! escalation -- absence of an explicit grant is a denial, never inferred
//! from other grants.

use flowline_types::workflow::{Capability, Workflow};
use uuid::Uuid;

/// Whether a user holds a capability on a workflow.
///
/// - Owner: every capability, regardless of grants.
/// - View: public workflows, or any shared user.
/// - Execute: any shared user (execute is implied by sharing).
/// - Edit: only shared users with the explicit `can_edit` flag.
/// - Delete: owner only.
pub fn has_capability(user_id: Uuid, workflow: &Workflow, capability: Capability) -> bool {
    if user_id == workflow.owner_id {
        return true;
    }
    let grant = workflow.grant_for(user_id);
    match capability {
        Capability::View => workflow.is_public || grant.is_some(),
        Capability::Execute => grant.is_some(),
        Capability::Edit => grant.is_some_and(|g| g.can_edit),
        Capability::Delete => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowline_types::workflow::{ShareGrant, WorkflowKind};

    fn workflow(owner: Uuid, shared: Vec<ShareGrant>, is_public: bool) -> Workflow {
        Workflow {
            id: Uuid::now_v7(),
            name: "test".to_string(),
            description: None,
            owner_id: owner,
            kind: WorkflowKind::Personal,
            triggers: vec![],
            actions: vec![],
            shared_with: shared,
            is_public,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_has_every_capability() {
        let owner = Uuid::now_v7();
        let wf = workflow(owner, vec![], false);
        for cap in [
            Capability::View,
            Capability::Execute,
            Capability::Edit,
            Capability::Delete,
        ] {
            assert!(has_capability(owner, &wf, cap), "owner should hold {cap}");
        }
    }

    #[test]
    fn shared_user_views_and_executes_but_not_edits() {
        let owner = Uuid::now_v7();
        let shared = Uuid::now_v7();
        let wf = workflow(
            owner,
            vec![ShareGrant {
                user_id: shared,
                can_edit: false,
            }],
            false,
        );
        assert!(has_capability(shared, &wf, Capability::View));
        assert!(has_capability(shared, &wf, Capability::Execute));
        assert!(!has_capability(shared, &wf, Capability::Edit));
        assert!(!has_capability(shared, &wf, Capability::Delete));
    }

    #[test]
    fn edit_grant_allows_edit_only() {
        let owner = Uuid::now_v7();
        let editor = Uuid::now_v7();
        let wf = workflow(
            owner,
            vec![ShareGrant {
                user_id: editor,
                can_edit: true,
            }],
            false,
        );
        assert!(has_capability(editor, &wf, Capability::Edit));
        assert!(!has_capability(editor, &wf, Capability::Delete));
    }

    #[test]
    fn stranger_gets_nothing_on_private_workflow() {
        let wf = workflow(Uuid::now_v7(), vec![], false);
        let stranger = Uuid::now_v7();
        for cap in [
            Capability::View,
            Capability::Execute,
            Capability::Edit,
            Capability::Delete,
        ] {
            assert!(!has_capability(stranger, &wf, cap));
        }
    }

    #[test]
    fn public_workflow_grants_only_view_to_strangers() {
        let wf = workflow(Uuid::now_v7(), vec![], true);
        let stranger = Uuid::now_v7();
        assert!(has_capability(stranger, &wf, Capability::View));
        assert!(!has_capability(stranger, &wf, Capability::Execute));
        assert!(!has_capability(stranger, &wf, Capability::Edit));
        assert!(!has_capability(stranger, &wf, Capability::Delete));
    }
}
