//! Strain distribution: greedy, order-sensitive packing of strain requests
//! onto the canonical slot sequence.
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{LOG_ALLOCATE, STRAIN_COUNT_SEPARATOR};
use crate::error::{EngineError, EngineResult};
use crate::grid::{RoomConfig, SlotKey};
use crate::room::{Room, SlotAssignment};

/// One `Name: count` line of strain-quantity input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrainRequest {
    pub name: String,
    pub count: u32,
}

/// Parse strain-quantity text, one request per line, in input order.
///
/// Blank lines are ignored. Any other line that does not parse fails the
/// whole input; no default count is ever guessed.
///
/// # Errors
///
/// Returns [`EngineError::Parse`] naming the first malformed line.
pub fn parse_strain_requests(text: &str) -> EngineResult<Vec<StrainRequest>> {
    let mut requests = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let parse_error = |reason: &'static str| EngineError::Parse {
            line_number: idx + 1,
            line: line.to_string(),
            reason,
        };
        let (name, count) = line
            .split_once(STRAIN_COUNT_SEPARATOR)
            .ok_or_else(|| parse_error("missing `:` separator"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(parse_error("strain name is empty"));
        }
        let count = count
            .trim()
            .parse::<u32>()
            .map_err(|_| parse_error("count is not a non-negative integer"))?;
        requests.push(StrainRequest {
            name: name.to_string(),
            count,
        });
    }
    Ok(requests)
}

/// Plants placed for one strain by a distribution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrainTotal {
    pub name: String,
    pub requested: u32,
    pub allocated: u32,
    pub slots: u32,
}

impl StrainTotal {
    /// Plants placed beyond the request because slots are whole.
    #[must_use]
    pub const fn over_allocation(&self) -> u32 {
        self.allocated.saturating_sub(self.requested)
    }

    /// Plants that found no slot because the grid ran out.
    #[must_use]
    pub const fn shortfall(&self) -> u32 {
        self.requested.saturating_sub(self.allocated)
    }
}

/// Result of packing requests onto a grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    pub mapping: BTreeMap<SlotKey, SlotAssignment>,
    /// One entry per distinct strain, in first-requested order.
    pub totals: Vec<StrainTotal>,
}

impl Distribution {
    /// Allocated plant count for `strain`, zero when it was never requested.
    #[must_use]
    pub fn total_for(&self, strain: &str) -> u32 {
        self.totals
            .iter()
            .find(|t| t.name == strain)
            .map_or(0, |t| t.allocated)
    }

    /// `strainName → plantsAllocated`.
    #[must_use]
    pub fn usage_totals(&self) -> BTreeMap<String, u32> {
        self.totals
            .iter()
            .map(|t| (t.name.clone(), t.allocated))
            .collect()
    }

    #[must_use]
    pub fn slots_used(&self) -> usize {
        self.mapping.len()
    }
}

/// Walk the slot sequence once with a single shared cursor, giving each
/// request whole slots until its count is met or the grid is exhausted.
#[must_use]
pub fn allocate(config: &RoomConfig, requests: &[StrainRequest]) -> Distribution {
    let plants_per_light = config.plants_per_light();
    let mut cursor = config.all_slots();
    let mut distribution = Distribution::default();

    for request in requests {
        let idx = match distribution
            .totals
            .iter()
            .position(|t| t.name == request.name)
        {
            Some(idx) => idx,
            None => {
                distribution.totals.push(StrainTotal {
                    name: request.name.clone(),
                    requested: 0,
                    allocated: 0,
                    slots: 0,
                });
                distribution.totals.len() - 1
            }
        };
        let total = &mut distribution.totals[idx];
        total.requested = total.requested.saturating_add(request.count);

        let mut placed = 0_u32;
        while placed < request.count {
            let Some(key) = cursor.next() else {
                break;
            };
            distribution.mapping.insert(
                key,
                SlotAssignment::allocated(&request.name, plants_per_light),
            );
            placed = placed.saturating_add(plants_per_light);
            total.slots += 1;
        }
        total.allocated = total.allocated.saturating_add(placed);

        if placed < request.count {
            warn!(
                target: LOG_ALLOCATE,
                "grid exhausted: {} placed {placed} of {} plants",
                request.name,
                request.count
            );
        } else if placed > request.count {
            debug!(
                target: LOG_ALLOCATE,
                "{} over-allocated by {} plants (whole slots)",
                request.name,
                placed - request.count
            );
        }
    }

    debug!(
        target: LOG_ALLOCATE,
        "distributed {} strains across {} of {} slots",
        distribution.totals.len(),
        distribution.mapping.len(),
        config.total_slots()
    );
    distribution
}

/// What to do with plant identifiers already entered when the strain mapping
/// is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionPolicy {
    /// Refuse while any slot holds an identifier.
    #[default]
    RefuseIfAssigned,
    /// Replace the mapping and drop every existing identifier.
    DiscardIdentifiers,
}

/// Result of a distribution applied to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionOutcome {
    pub totals: Vec<StrainTotal>,
    pub slots_used: usize,
    pub slots_available: usize,
    pub discarded_identifiers: usize,
}

fn guard_identifiers(room: &Room, policy: DistributionPolicy) -> EngineResult<usize> {
    let identifiers = room.all_plant_ids().len();
    if identifiers > 0 && policy == DistributionPolicy::RefuseIfAssigned {
        return Err(EngineError::AssignedIdentifiers {
            slots: room.slots_with_identifiers(),
            identifiers,
        });
    }
    if identifiers > 0 {
        warn!(
            target: LOG_ALLOCATE,
            "discarding {identifiers} plant identifiers from the previous mapping"
        );
    }
    Ok(identifiers)
}

/// Parse `text`, pack it onto the room's grid and replace the room's mapping.
///
/// The replacement is wholesale, never additive. Nothing is changed when the
/// text fails to parse or the policy refuses.
///
/// # Errors
///
/// Returns [`EngineError::Parse`] for malformed input and
/// [`EngineError::AssignedIdentifiers`] when the policy refuses.
pub fn distribute(
    room: &mut Room,
    text: &str,
    policy: DistributionPolicy,
) -> EngineResult<DistributionOutcome> {
    let requests = parse_strain_requests(text)?;
    let discarded_identifiers = guard_identifiers(room, policy)?;
    let distribution = allocate(room.config(), &requests);
    let outcome = DistributionOutcome {
        slots_used: distribution.slots_used(),
        slots_available: room.config().total_slots(),
        totals: distribution.totals,
        discarded_identifiers,
    };
    room.replace_slots(distribution.mapping, text);
    Ok(outcome)
}

/// Clear every slot assignment and the stored strain input.
///
/// # Errors
///
/// Returns [`EngineError::AssignedIdentifiers`] when the policy refuses.
pub fn reset(room: &mut Room, policy: DistributionPolicy) -> EngineResult<usize> {
    let discarded = guard_identifiers(room, policy)?;
    room.replace_slots(BTreeMap::new(), "");
    Ok(discarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::slot_key;

    fn requests(pairs: &[(&str, u32)]) -> Vec<StrainRequest> {
        pairs
            .iter()
            .map(|(name, count)| StrainRequest {
                name: (*name).to_string(),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn parses_lines_in_order_and_skips_blanks() {
        let parsed = parse_strain_requests("Blue Dream: 100\n\n  Gelato :50 \r\nZero:0\n").unwrap();
        assert_eq!(
            parsed,
            requests(&[("Blue Dream", 100), ("Gelato", 50), ("Zero", 0)])
        );
    }

    #[test]
    fn parse_surfaces_the_offending_line() {
        let err = parse_strain_requests("A: 10\nB 20\nC: 5").unwrap_err();
        assert_eq!(
            err,
            EngineError::Parse {
                line_number: 2,
                line: "B 20".to_string(),
                reason: "missing `:` separator",
            }
        );
        assert!(matches!(
            parse_strain_requests("A: ten"),
            Err(EngineError::Parse { line_number: 1, .. })
        ));
        assert!(matches!(
            parse_strain_requests("A: -4"),
            Err(EngineError::Parse { .. })
        ));
        assert!(matches!(
            parse_strain_requests(" : 4"),
            Err(EngineError::Parse {
                reason: "strain name is empty",
                ..
            })
        ));
    }

    #[test]
    fn whole_slots_are_consumed_in_sequence() {
        let config = RoomConfig::uniform(4, 5, 15).unwrap();
        let dist = allocate(&config, &requests(&[("A", 100), ("B", 50)]));
        assert_eq!(dist.total_for("A"), 105);
        assert_eq!(dist.total_for("B"), 60);
        assert_eq!(dist.slots_used(), 11);
        assert_eq!(dist.totals[0].over_allocation(), 5);
        assert_eq!(dist.totals[1].over_allocation(), 10);
        assert_eq!(
            dist.mapping[&slot_key(1, 1)].strain_name.as_deref(),
            Some("A")
        );
        assert_eq!(
            dist.mapping[&slot_key(1, 2)].strain_name.as_deref(),
            Some("B")
        );
        assert!(!dist.mapping.contains_key(&slot_key(2, 1)));
    }

    #[test]
    fn exhaustion_starves_later_requests_without_error() {
        let config = RoomConfig::uniform(2, 3, 15).unwrap();
        let dist = allocate(&config, &requests(&[("A", 100), ("B", 50)]));
        assert_eq!(dist.total_for("A"), 90);
        assert_eq!(dist.total_for("B"), 0);
        assert_eq!(dist.totals[0].shortfall(), 10);
        assert_eq!(dist.totals[1].slots, 0);
        assert_eq!(
            dist.usage_totals(),
            BTreeMap::from([("A".to_string(), 90), ("B".to_string(), 0)])
        );
    }

    #[test]
    fn repeated_strain_names_merge_totals() {
        let config = RoomConfig::uniform(1, 4, 10).unwrap();
        let dist = allocate(&config, &requests(&[("A", 10), ("B", 5), ("A", 11)]));
        assert_eq!(dist.totals.len(), 2);
        assert_eq!(dist.total_for("A"), 30);
        assert_eq!(dist.totals[0].requested, 21);
        assert_eq!(dist.total_for("B"), 10);
        assert_eq!(dist.total_for("C"), 0);
    }

    #[test]
    fn zero_count_consumes_nothing() {
        let config = RoomConfig::uniform(1, 2, 10).unwrap();
        let dist = allocate(&config, &requests(&[("A", 0), ("B", 1)]));
        assert_eq!(dist.total_for("A"), 0);
        assert_eq!(
            dist.mapping[&slot_key(0, 0)].strain_name.as_deref(),
            Some("B")
        );
    }

    #[test]
    fn distribute_replaces_rather_than_adds() {
        let mut room = Room::new(RoomConfig::uniform(1, 4, 10).unwrap());
        distribute(&mut room, "A: 40", DistributionPolicy::RefuseIfAssigned).unwrap();
        assert_eq!(room.slots().len(), 4);
        let outcome = distribute(&mut room, "B: 10", DistributionPolicy::RefuseIfAssigned).unwrap();
        assert_eq!(outcome.slots_used, 1);
        assert_eq!(outcome.slots_available, 4);
        assert_eq!(room.slots().len(), 1);
        assert_eq!(room.strain_input(), "B: 10");
    }

    #[test]
    fn refuse_policy_protects_entered_identifiers() {
        let mut room = Room::new(RoomConfig::uniform(1, 2, 2).unwrap());
        distribute(&mut room, "A: 4", DistributionPolicy::RefuseIfAssigned).unwrap();
        room.write_plant_ids(slot_key(0, 1), vec!["P1".into(), String::new()]);
        let before = room.clone();

        let err = distribute(&mut room, "B: 4", DistributionPolicy::RefuseIfAssigned).unwrap_err();
        assert_eq!(
            err,
            EngineError::AssignedIdentifiers {
                slots: vec![slot_key(0, 1)],
                identifiers: 1,
            }
        );
        assert_eq!(room, before);
        assert!(reset(&mut room, DistributionPolicy::RefuseIfAssigned).is_err());

        let outcome =
            distribute(&mut room, "B: 4", DistributionPolicy::DiscardIdentifiers).unwrap();
        assert_eq!(outcome.discarded_identifiers, 1);
        assert!(room.all_plant_ids().is_empty());
    }

    #[test]
    fn parse_failure_leaves_room_untouched() {
        let mut room = Room::new(RoomConfig::uniform(1, 2, 2).unwrap());
        distribute(&mut room, "A: 4", DistributionPolicy::RefuseIfAssigned).unwrap();
        let before = room.clone();
        assert!(distribute(&mut room, "B", DistributionPolicy::DiscardIdentifiers).is_err());
        assert_eq!(room, before);
        assert_eq!(reset(&mut room, DistributionPolicy::RefuseIfAssigned), Ok(0));
        assert!(room.slots().is_empty());
    }
}
