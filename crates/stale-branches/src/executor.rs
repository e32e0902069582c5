//! Carries out a [`Plan`].

use tracing::{info, warn};

use crate::config::Params;
use crate::error::{Result, StaleBranchError};
use crate::events::{EventSink, RunEvent};
use crate::recipient::resolve_recipient;
use crate::store::CommentStore;
use crate::tagged::{stale_tag, TaggedComments};
use crate::template::format_comment_message;
use crate::types::{Branch, CommitComment, Plan};

/// What the executor needs besides the plan itself.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub store: &'a dyn CommentStore,
    pub params: &'a Params,
    pub sink: &'a dyn EventSink,
}

/// Perform the side effect for `plan`. In dry-run mode nothing is mutated.
pub async fn process_branch(
    plan: &Plan,
    branch: &Branch,
    ctx: ExecutionContext<'_>,
) -> Result<()> {
    let dry_run = ctx.params.dry_run;

    match plan {
        Plan::Skip { .. } | Plan::KeepStale { .. } => {}
        Plan::MarkStale { .. } if !dry_run => mark_stale(branch, ctx).await?,
        Plan::Remove { comments, .. } if !dry_run => remove(branch, comments, ctx).await?,
        Plan::MarkStale { .. } | Plan::Remove { .. } => {}
    }

    ctx.sink.emit(RunEvent::Executed {
        branch: branch.branch_name.clone(),
        kind: plan.kind(),
        dry_run,
    });
    Ok(())
}

async fn mark_stale(branch: &Branch, ctx: ExecutionContext<'_>) -> Result<()> {
    let params = ctx.params;
    let recipient = resolve_recipient(branch.author.as_ref(), params);
    let body = format_comment_message(
        &params.stale_comment_message,
        &branch.branch_name,
        &recipient,
        params,
    );

    if !params.comment_delay.is_zero() {
        tokio::time::sleep(params.comment_delay).await;
    }

    TaggedComments::new(ctx.store)
        .add_tagged_comment(&branch.commit_id, &stale_tag(&branch.branch_name), &body)
        .await?;

    info!(branch = %branch.branch_name, recipient = %recipient, "-> posted stale comment");
    Ok(())
}

async fn remove(
    branch: &Branch,
    comments: &[CommitComment],
    ctx: ExecutionContext<'_>,
) -> Result<()> {
    if !ctx.params.delete_delay.is_zero() {
        tokio::time::sleep(ctx.params.delete_delay).await;
    }

    ctx.store
        .delete_branch_ref(&branch.prefix, &branch.branch_name)
        .await?;
    info!(branch = %branch.branch_name, "-> deleted branch");

    let mut failed = 0;
    for comment in comments {
        if let Err(e) = ctx.store.delete_commit_comment(comment.id).await {
            warn!(
                branch = %branch.branch_name,
                comment_id = comment.id,
                error = %e,
                "Failed to delete stale comment"
            );
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(StaleBranchError::IncompleteCleanup {
            failed,
            total: comments.len(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventSink;
    use crate::memory::InMemoryCommentStore;
    use crate::types::{Author, PlanKind, Repo, SkipReason};
    use chrono::{Duration, Utc};

    fn branch() -> Branch {
        Branch {
            branch_name: "feature-1".to_string(),
            prefix: "refs/heads/".to_string(),
            commit_id: "abc123".to_string(),
            date: Utc::now() - Duration::days(100),
            author: Some(Author {
                username: "user1".to_string(),
                email: None,
                belongs_to_organization: false,
            }),
            is_protected: false,
            open_prs: false,
        }
    }

    fn params(dry_run: bool) -> Params {
        let mut params = Params::new(Repo::new("github", "octocat"));
        params.dry_run = dry_run;
        params.stale_comment_message = "{author}: {branchName} is stale".to_string();
        params
    }

    #[tokio::test]
    async fn test_mark_stale_posts_tagged_comment() {
        let store = InMemoryCommentStore::new();
        let sink = MemoryEventSink::new();
        let params = params(false);
        let plan = Plan::MarkStale {
            cutoff_time: Utc::now(),
        };

        process_branch(
            &plan,
            &branch(),
            ExecutionContext {
                store: &store,
                params: &params,
                sink: &sink,
            },
        )
        .await
        .unwrap();

        let comments = store.comments_on("abc123");
        assert_eq!(comments.len(), 1);
        assert_eq!(
            comments[0].body,
            "[stale:feature-1]\r\n\r\nuser1: feature-1 is stale"
        );
    }

    #[tokio::test]
    async fn test_mark_stale_uses_remapped_author() {
        let store = InMemoryCommentStore::new();
        let sink = MemoryEventSink::new();
        let mut params = params(false);
        params
            .remap_authors
            .insert("user1".to_string(), "remappedUser".to_string());

        process_branch(
            &Plan::MarkStale {
                cutoff_time: Utc::now(),
            },
            &branch(),
            ExecutionContext {
                store: &store,
                params: &params,
                sink: &sink,
            },
        )
        .await
        .unwrap();

        assert!(store.comments_on("abc123")[0]
            .body
            .ends_with("remappedUser: feature-1 is stale"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_mutate() {
        let store = InMemoryCommentStore::new();
        let id = store.insert_comment("abc123", "[stale:feature-1] old", Utc::now());
        let sink = MemoryEventSink::new();
        let params = params(true);
        let ctx = ExecutionContext {
            store: &store,
            params: &params,
            sink: &sink,
        };

        process_branch(
            &Plan::MarkStale {
                cutoff_time: Utc::now(),
            },
            &branch(),
            ctx,
        )
        .await
        .unwrap();
        process_branch(
            &Plan::Remove {
                last_comment_time: None,
                cutoff_time: Utc::now(),
                comments: store.comments_on("abc123"),
            },
            &branch(),
            ctx,
        )
        .await
        .unwrap();

        assert_eq!(store.comment_count(), 1);
        assert_eq!(store.comments_on("abc123")[0].id, id);
        assert!(store.deleted_refs().is_empty());
        assert!(sink.events().iter().all(|e| matches!(
            e,
            RunEvent::Executed { dry_run: true, .. }
        )));
    }

    #[tokio::test]
    async fn test_remove_deletes_branch_then_comments() {
        let store = InMemoryCommentStore::new();
        store.insert_comment("abc123", "[stale:feature-1] old", Utc::now());
        store.insert_comment("abc123", "unrelated", Utc::now());
        let comments: Vec<_> = store
            .comments_on("abc123")
            .into_iter()
            .filter(|c| c.body.starts_with("[stale:"))
            .collect();
        let sink = MemoryEventSink::new();
        let params = params(false);

        process_branch(
            &Plan::Remove {
                last_comment_time: None,
                cutoff_time: Utc::now(),
                comments,
            },
            &branch(),
            ExecutionContext {
                store: &store,
                params: &params,
                sink: &sink,
            },
        )
        .await
        .unwrap();

        assert_eq!(store.deleted_refs(), vec!["heads/feature-1".to_string()]);
        let remaining = store.comments_on("abc123");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].body, "unrelated");
    }

    #[tokio::test]
    async fn test_failed_branch_delete_keeps_comments() {
        let store = InMemoryCommentStore::new();
        store.insert_comment("abc123", "[stale:feature-1] old", Utc::now());
        store.fail_deleting_ref("feature-1");
        let sink = MemoryEventSink::new();
        let params = params(false);

        let result = process_branch(
            &Plan::Remove {
                last_comment_time: None,
                cutoff_time: Utc::now(),
                comments: store.comments_on("abc123"),
            },
            &branch(),
            ExecutionContext {
                store: &store,
                params: &params,
                sink: &sink,
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(store.comment_count(), 1);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_skip_and_keep_have_no_effect() {
        let store = InMemoryCommentStore::new();
        let sink = MemoryEventSink::new();
        let params = params(false);
        let ctx = ExecutionContext {
            store: &store,
            params: &params,
            sink: &sink,
        };

        process_branch(
            &Plan::Skip {
                reason: SkipReason::Exempted,
            },
            &branch(),
            ctx,
        )
        .await
        .unwrap();
        process_branch(
            &Plan::KeepStale {
                last_comment_time: Utc::now(),
                cutoff_time: Utc::now(),
            },
            &branch(),
            ctx,
        )
        .await
        .unwrap();

        assert_eq!(store.comment_count(), 0);
        assert!(store.deleted_refs().is_empty());
        let kinds: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Executed { kind, .. } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![PlanKind::Skip, PlanKind::KeepStale]);
    }

    #[tokio::test]
    async fn test_failed_comment_delete_reports_incomplete_cleanup() {
        let store = InMemoryCommentStore::new();
        store.insert_comment("abc123", "[stale:feature-1] one", Utc::now());
        let stuck = store.insert_comment("abc123", "[stale:feature-1] two", Utc::now());
        store.insert_comment("abc123", "[stale:feature-1] three", Utc::now());
        store.fail_deleting_comment(stuck);
        let sink = MemoryEventSink::new();
        let params = params(false);

        let result = process_branch(
            &Plan::Remove {
                last_comment_time: None,
                cutoff_time: Utc::now(),
                comments: store.comments_on("abc123"),
            },
            &branch(),
            ExecutionContext {
                store: &store,
                params: &params,
                sink: &sink,
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(StaleBranchError::IncompleteCleanup {
                failed: 1,
                total: 3
            })
        ));
        assert_eq!(store.deleted_refs(), vec!["heads/feature-1".to_string()]);
        let remaining: Vec<_> = store.comments_on("abc123").iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![stuck]);
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_comment_waits_for_comment_delay() {
        let store = InMemoryCommentStore::new();
        let sink = MemoryEventSink::new();
        let mut params = params(false);
        params.comment_delay = std::time::Duration::from_millis(1500);
        let started = tokio::time::Instant::now();

        let plan = Plan::MarkStale {
            cutoff_time: Utc::now(),
        };
        let branch = branch();
        let (result, ()) = tokio::join!(
            process_branch(
                &plan,
                &branch,
                ExecutionContext {
                    store: &store,
                    params: &params,
                    sink: &sink,
                },
            ),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(750)).await;
                assert_eq!(store.comment_count(), 0);
            }
        );

        result.unwrap();
        assert!(started.elapsed() >= params.comment_delay);
        assert_eq!(store.comment_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_waits_for_delete_delay() {
        let store = InMemoryCommentStore::new();
        store.insert_comment("abc123", "[stale:feature-1] old", Utc::now());
        let sink = MemoryEventSink::new();
        let mut params = params(false);
        params.delete_delay = std::time::Duration::from_secs(2);
        let started = tokio::time::Instant::now();

        let plan = Plan::Remove {
            last_comment_time: None,
            cutoff_time: Utc::now(),
            comments: store.comments_on("abc123"),
        };
        let branch = branch();
        let (result, ()) = tokio::join!(
            process_branch(
                &plan,
                &branch,
                ExecutionContext {
                    store: &store,
                    params: &params,
                    sink: &sink,
                },
            ),
            async {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                assert!(store.deleted_refs().is_empty());
                assert_eq!(store.comment_count(), 1);
            }
        );

        result.unwrap();
        assert!(started.elapsed() >= params.delete_delay);
        assert_eq!(store.deleted_refs(), vec!["heads/feature-1".to_string()]);
        assert_eq!(store.comment_count(), 0);
    }
}
