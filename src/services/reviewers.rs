//! Review-workload aggregation.
//!
//! Combines the inferred team with the currently open pull requests into a
//! ranked [`ReviewersInformation`] snapshot: per-member unreviewed counts,
//! staleness flags, the lead-reviewer pick and the preferred-reviewer
//! suggestions. Everything here is pure; all sort keys are fully
//! deterministic so identical inputs yield identical snapshots.

use crate::models::{
    Density, PullRequest, Reviewer, ReviewersInformation, ReviewerStatus, User,
};
use crate::services::team_members::TeamConfig;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Pick the lead reviewer: the member maximizing `inbound / max(1, outbound)`,
/// provided that ratio exceeds `threshold`.
///
/// Iteration is in slug order and only a strictly greater ratio displaces
/// the incumbent, so ties resolve to the lexicographically smaller slug.
pub fn lead_user(team_members: &BTreeMap<User, Density>, threshold: f64) -> Option<User> {
    let mut lead_ratio = 0.0;
    let mut lead: Option<&User> = None;

    for (user, density) in team_members {
        let ratio = f64::from(density.inbound) / f64::from(density.outbound.max(1));
        if ratio > lead_ratio {
            lead_ratio = ratio;
            lead = Some(user);
        }
    }

    if lead_ratio > threshold {
        lead.cloned()
    } else {
        None
    }
}

/// Load-adjusted suggestion score; lower is better.
///
/// Rewards low current load and penalizes members with little cross-review
/// history, biasing suggestions toward established, currently idle
/// reviewers.
fn preference_score(reviewer: &Reviewer) -> f64 {
    f64::from(reviewer.reviews_count + 1).powf(2.5)
        - f64::from(reviewer.density.inbound) * f64::from(reviewer.density.outbound)
}

/// Combine team and open pull requests into one aggregation snapshot.
pub fn reviewers_information_from(
    team_members: &BTreeMap<User, Density>,
    pull_requests: &[PullRequest],
    server_url: &str,
    now: DateTime<Utc>,
    config: &TeamConfig,
) -> ReviewersInformation {
    // Every team member appears in the output, idle or not.
    let mut review_counts: BTreeMap<&User, u32> =
        team_members.keys().map(|user| (user, 0)).collect();
    let mut lazy_reviewers: BTreeSet<&str> = BTreeSet::new();

    for pull_request in pull_requests {
        for member in pull_request.unapproved_reviewers() {
            if let Some(count) = review_counts.get_mut(&member.user) {
                *count += 1;
            }
        }

        if pull_request.is_lazily_reviewed(now) {
            for member in &pull_request.reviewers {
                if member.status == ReviewerStatus::Unapproved {
                    lazy_reviewers.insert(member.user.slug.as_str());
                }
            }
        }
    }

    let lead = lead_user(team_members, config.lead_threshold());

    let mut reviewers: Vec<Reviewer> = review_counts
        .into_iter()
        .map(|(user, reviews_count)| Reviewer {
            user: user.clone(),
            density: team_members[user],
            reviews_count,
            is_lazy: lazy_reviewers.contains(user.slug.as_str()),
        })
        .collect();

    // Least-loaded first, lead pinned to the top as a call-out.
    reviewers.sort_by(|a, b| {
        (Some(&a.user) != lead.as_ref())
            .cmp(&(Some(&b.user) != lead.as_ref()))
            .then_with(|| a.reviews_count.cmp(&b.reviews_count))
            .then_with(|| a.user.display_name.cmp(&b.user.display_name))
            .then_with(|| a.user.slug.cmp(&b.user.slug))
    });

    let mut preferred_reviewers = reviewers.clone();
    preferred_reviewers.sort_by(|a, b| {
        (Some(&a.user) != lead.as_ref())
            .cmp(&(Some(&b.user) != lead.as_ref()))
            .then_with(|| preference_score(a).total_cmp(&preference_score(b)))
            .then_with(|| a.user.display_name.cmp(&b.user.display_name))
            .then_with(|| a.user.slug.cmp(&b.user.slug))
    });
    preferred_reviewers.truncate(3);

    ReviewersInformation {
        reviewers,
        preferred_reviewers,
        lead,
        server_url: server_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pull_request::testing::{member, pull_request, reviewer};
    use crate::models::{MemberRole, ReviewerStatus};
    use crate::models::user::test_user;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn config() -> TeamConfig {
        // Default budget: 1 page x 20 PRs, lead threshold 15.
        TeamConfig::default()
    }

    fn team(entries: &[(&str, u32, u32)]) -> BTreeMap<User, Density> {
        entries
            .iter()
            .map(|(slug, inbound, outbound)| (test_user(slug), Density::new(*inbound, *outbound)))
            .collect()
    }

    #[test]
    fn test_lead_requires_overwhelming_ratio() {
        // P5: ratio 15 does not exceed the threshold of 15; ratio 16 does.
        let below = team(&[("anna", 15, 1)]);
        assert_eq!(lead_user(&below, config().lead_threshold()), None);

        let above = team(&[("anna", 16, 1)]);
        assert_eq!(
            lead_user(&above, config().lead_threshold()),
            Some(test_user("anna"))
        );
    }

    #[test]
    fn test_lead_zero_outbound_counts_as_one() {
        let members = team(&[("anna", 16, 0)]);
        assert_eq!(
            lead_user(&members, config().lead_threshold()),
            Some(test_user("anna"))
        );
    }

    #[test]
    fn test_lead_tie_resolves_to_smaller_slug() {
        let members = team(&[("bert", 16, 1), ("anna", 16, 1)]);
        assert_eq!(
            lead_user(&members, config().lead_threshold()),
            Some(test_user("anna"))
        );
    }

    #[test]
    fn test_counts_only_unapproved_team_reviewers() {
        let members = team(&[("anna", 5, 1), ("bert", 1, 5)]);
        let prs = vec![
            pull_request(1, "me", vec![reviewer("anna", false), reviewer("bert", true)]),
            pull_request(2, "me", vec![reviewer("anna", false), reviewer("carl", false)]),
        ];

        let info = reviewers_information_from(&members, &prs, "https://git", now(), &config());

        let anna = info.reviewers.iter().find(|r| r.user.slug == "anna").unwrap();
        let bert = info.reviewers.iter().find(|r| r.user.slug == "bert").unwrap();
        assert_eq!(anna.reviews_count, 2);
        // Approved entries do not count...
        assert_eq!(bert.reviews_count, 0);
        // ...and non-team reviewers are not in the output at all.
        assert!(info.reviewers.iter().all(|r| r.user.slug != "carl"));
    }

    #[test]
    fn test_workload_scenario_orders_least_loaded_first() {
        // Spec scenario: A with 3 pending reviews, B idle, neither is lead.
        let members = team(&[("aaa", 5, 1), ("bbb", 1, 5)]);
        let prs = vec![
            pull_request(1, "me", vec![reviewer("aaa", false)]),
            pull_request(2, "me", vec![reviewer("aaa", false)]),
            pull_request(3, "me", vec![reviewer("aaa", false)]),
        ];

        let info = reviewers_information_from(&members, &prs, "https://git", now(), &config());

        assert_eq!(info.lead, None);
        let order: Vec<_> = info.reviewers.iter().map(|r| r.user.slug.as_str()).collect();
        assert_eq!(order, vec!["bbb", "aaa"]);

        // Preferred: B scores 1 - 5 = -4, A scores 32 - 5 = 27.
        let preferred: Vec<_> = info
            .preferred_reviewers
            .iter()
            .map(|r| r.user.slug.as_str())
            .collect();
        assert_eq!(preferred, vec!["bbb", "aaa"]);
    }

    #[test]
    fn test_lead_pinned_to_top_despite_load() {
        let members = team(&[("zoe", 40, 1), ("anna", 3, 3)]);
        let prs = vec![
            pull_request(1, "me", vec![reviewer("zoe", false)]),
            pull_request(2, "me", vec![reviewer("zoe", false)]),
        ];

        let info = reviewers_information_from(&members, &prs, "https://git", now(), &config());

        assert_eq!(info.lead, Some(test_user("zoe")));
        assert_eq!(info.reviewers[0].user.slug, "zoe");
        assert_eq!(info.preferred_reviewers[0].user.slug, "zoe");
    }

    #[test]
    fn test_preferred_truncated_to_three() {
        let members = team(&[("a", 3, 1), ("b", 3, 1), ("c", 3, 1), ("d", 3, 1)]);
        let info = reviewers_information_from(&members, &[], "https://git", now(), &config());

        assert_eq!(info.reviewers.len(), 4);
        assert_eq!(info.preferred_reviewers.len(), 3);
    }

    #[test]
    fn test_lazy_flag_for_unapproved_on_stale_pr() {
        let members = team(&[("anna", 5, 1), ("bert", 5, 1)]);

        // Created five days ago, never updated: lazily reviewed.
        let mut stale = pull_request(
            1,
            "me",
            vec![
                reviewer("anna", false),
                member("bert", MemberRole::Reviewer, false, ReviewerStatus::NeedsWork),
            ],
        );
        stale.created_date = now().timestamp_millis() - 5 * 24 * 60 * 60 * 1000;
        stale.updated_date = stale.created_date;

        let info = reviewers_information_from(&members, &[stale], "https://git", now(), &config());

        let anna = info.reviewers.iter().find(|r| r.user.slug == "anna").unwrap();
        let bert = info.reviewers.iter().find(|r| r.user.slug == "bert").unwrap();
        // Only the reviewer who has not reacted at all is flagged.
        assert!(anna.is_lazy);
        assert!(!bert.is_lazy);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        // P4: identical inputs produce identical snapshots, including order.
        let members = team(&[("anna", 5, 1), ("bert", 1, 5), ("carl", 3, 3)]);
        let prs = vec![
            pull_request(1, "me", vec![reviewer("anna", false), reviewer("carl", false)]),
            pull_request(2, "me", vec![reviewer("bert", false)]),
        ];

        let first = reviewers_information_from(&members, &prs, "https://git", now(), &config());
        let second = reviewers_information_from(&members, &prs, "https://git", now(), &config());
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_team_yields_empty_information() {
        let info =
            reviewers_information_from(&BTreeMap::new(), &[], "https://git", now(), &config());
        assert!(info.reviewers.is_empty());
        assert!(info.preferred_reviewers.is_empty());
        assert_eq!(info.lead, None);
        assert_eq!(info.server_url, "https://git");
    }
}
