//! Query and filter pipeline over a set of service descriptors.

use crate::desc::ServiceDescriptor;
use crate::wildcard::wildcard_match;
use crate::{META_SVC_GROUP, META_SVC_INDEX};

/// The four-valued control-flow result a filter function returns for one
/// descriptor. Deliberately not `bool` — `Stop` and `Yield` have no
/// bool-shaped analogue (see design note in §9).
pub enum FilterOutcome<T> {
    /// Descriptor passes this filter; advance to the next filter.
    Continue,
    /// Drop this descriptor; advance to the next descriptor.
    Drop,
    /// Abort the whole traversal immediately.
    Stop,
    /// Record `value` as the overall return value; keep traversing filters
    /// for this descriptor (and subsequent descriptors).
    Yield(T),
}

pub type Filter<T> = dyn Fn(&ServiceDescriptor) -> FilterOutcome<T>;

/// Options for [`query_ex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// When set, results are ordered by `(SvcGroup, SvcIndex)` with
    /// `SvcIndex` compared as a string, not numerically.
    pub sort: bool,
}

/// Apply `filters` in order to every descriptor in `candidates`, honoring
/// the four-valued control flow. Descriptors for which no filter yields a
/// value are included in the result as-is (`T` must therefore be
/// constructible from a descriptor reference when no filter overrides it —
/// callers that only need filtering, not transformation, should use
/// [`ServiceDescriptor::clone`] as their yield value).
pub fn query_ex<T>(
    candidates: &[ServiceDescriptor],
    opt: QueryOptions,
    filters: &[&Filter<T>],
    default_yield: impl Fn(&ServiceDescriptor) -> T,
) -> Vec<T> {
    let mut ordered: Vec<&ServiceDescriptor> = candidates.iter().collect();
    if opt.sort {
        ordered.sort_by(|a, b| {
            a.get_meta(META_SVC_GROUP)
                .cmp(b.get_meta(META_SVC_GROUP))
                .then_with(|| a.get_meta(META_SVC_INDEX).cmp(b.get_meta(META_SVC_INDEX)))
        });
    }

    let mut results = Vec::new();
    'next_desc: for desc in ordered {
        let mut ret = default_yield(desc);
        for filter in filters {
            match filter(desc) {
                FilterOutcome::Continue => {}
                FilterOutcome::Drop => continue 'next_desc,
                FilterOutcome::Stop => {
                    // Matches the original: `End` aborts the whole
                    // traversal immediately, without recording the
                    // descriptor currently being evaluated.
                    return results;
                }
                FilterOutcome::Yield(v) => ret = v,
            }
        }
        results.push(ret);
    }
    results
}

/// `MatchSvcGroup(group)`: empty group matches everything.
pub fn filter_match_svc_group<T>(group: String) -> impl Fn(&ServiceDescriptor) -> FilterOutcome<T> {
    move |desc| {
        if group.is_empty() || desc.get_meta(META_SVC_GROUP) == group {
            FilterOutcome::Continue
        } else {
            FilterOutcome::Drop
        }
    }
}

/// `MatchSvcID(id)`: yields the descriptor itself on the first ID match.
pub fn filter_match_svc_id(id: String) -> impl Fn(&ServiceDescriptor) -> FilterOutcome<ServiceDescriptor> {
    move |desc| {
        if desc.id == id {
            FilterOutcome::Yield(desc.clone())
        } else {
            FilterOutcome::Continue
        }
    }
}

/// A single `Target` wildcard pattern matched against `SvcGroup`.
#[derive(Debug, Clone)]
pub struct MatchRule {
    pub target: String,
}

/// Parse `a|b|c` into one `MatchRule` per `|`-delimited segment.
pub fn parse_match_rule(rule: &str) -> Vec<MatchRule> {
    rule.split('|').map(|target| MatchRule { target: target.to_owned() }).collect()
}

/// `MatchRule(rules)`: passes if ANY rule's target wildcard-matches
/// `SvcGroup`.
pub fn filter_match_rule<T>(rules: Vec<MatchRule>) -> impl Fn(&ServiceDescriptor) -> FilterOutcome<T> {
    move |desc| {
        let group = desc.get_meta(META_SVC_GROUP);
        if rules.iter().any(|r| wildcard_match(group, &r.target)) {
            FilterOutcome::Continue
        } else {
            FilterOutcome::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(name: &str, group: &str, index: &str) -> ServiceDescriptor {
        let mut d = ServiceDescriptor::new(name, format!("{name}#{index}@{group}"), "h", 1);
        d.set_meta(META_SVC_GROUP, group);
        d.set_meta("SvcIndex", index);
        d
    }

    #[test]
    fn match_svc_group_empty_matches_all() {
        let candidates = vec![desc("game", "g1", "1"), desc("game", "g2", "1")];
        let filter = filter_match_svc_group::<ServiceDescriptor>(String::new());
        let results = query_ex(&candidates, QueryOptions::default(), &[&filter], |d| d.clone());
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn match_svc_group_drops_non_matching() {
        let candidates = vec![desc("game", "g1", "1"), desc("game", "g2", "1")];
        let filter = filter_match_svc_group::<ServiceDescriptor>("g1".to_owned());
        let results = query_ex(&candidates, QueryOptions::default(), &[&filter], |d| d.clone());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_meta(META_SVC_GROUP), "g1");
    }

    #[test]
    fn sort_orders_by_group_then_index_as_strings() {
        let candidates = vec![desc("game", "g1", "10"), desc("game", "g1", "2")];
        let results = query_ex(
            &candidates,
            QueryOptions { sort: true },
            &[],
            |d: &ServiceDescriptor| d.clone(),
        );
        // "10" < "2" lexicographically, unlike numeric comparison.
        assert_eq!(results[0].get_meta("SvcIndex"), "10");
        assert_eq!(results[1].get_meta("SvcIndex"), "2");
    }

    #[test]
    fn match_rule_passes_on_any_rule_hit() {
        let candidates = vec![desc("game", "us-east", "1"), desc("game", "eu-west", "1")];
        let rules = parse_match_rule("us-*|ap-*");
        let filter = filter_match_rule::<ServiceDescriptor>(rules);
        let results = query_ex(&candidates, QueryOptions::default(), &[&filter], |d| d.clone());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_meta(META_SVC_GROUP), "us-east");
    }

    #[test]
    fn stop_aborts_remaining_traversal_without_recording_current_descriptor() {
        let candidates = vec![desc("game", "g1", "1"), desc("game", "g2", "1")];
        let filter: Box<Filter<ServiceDescriptor>> = Box::new(|d: &ServiceDescriptor| {
            if d.get_meta(META_SVC_GROUP) == "g1" {
                FilterOutcome::Stop
            } else {
                FilterOutcome::Continue
            }
        });
        let results = query_ex(&candidates, QueryOptions::default(), &[filter.as_ref()], |d| d.clone());
        assert!(results.is_empty(), "Stop on the first descriptor should abort before anything is recorded");
    }

    #[test]
    fn stop_preserves_descriptors_recorded_before_it_fired() {
        let candidates = vec![desc("game", "g1", "1"), desc("game", "g2", "1")];
        let filter: Box<Filter<ServiceDescriptor>> = Box::new(|d: &ServiceDescriptor| {
            if d.get_meta(META_SVC_GROUP) == "g2" {
                FilterOutcome::Stop
            } else {
                FilterOutcome::Continue
            }
        });
        let results = query_ex(&candidates, QueryOptions::default(), &[filter.as_ref()], |d| d.clone());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_meta(META_SVC_GROUP), "g1");
    }
}
