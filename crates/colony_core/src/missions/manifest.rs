//! Nearest-insertion planning for a carrier's cargo list.
//!
//! A manifest is an ordered list of slots. An item waiting for pickup holds
//! two slots (its pickup, then its drop-off); an item already aboard holds
//! only its drop-off slot. Each slot stands for the point the carrier has
//! to visit for it.
//!
//! New items are inserted greedily and never reordered afterwards:
//!
//! * the pickup goes where it costs least: right after a slot at the very
//!   same point if there is one, otherwise right after the slot closest to
//!   the pickup, otherwise first (anchored on the carrier's position);
//! * the drop-off is placed the same way but only after the pickup,
//!   defaulting to the slot right after it. Items already aboard default to
//!   the front of the list instead.
//!
//! Everything here is pure; distances are supplied by the caller.

/// One manifest slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stop<T, P> {
    /// The item the slot belongs to.
    pub item: T,
    /// Point the carrier visits for this slot, if it still resolves.
    pub point: Option<P>,
}

/// Where a new item's slots go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Insertion {
    /// Index of the pickup slot, `None` for items already aboard.
    pub source: Option<usize>,
    /// Index of the drop-off slot, counted after the pickup was inserted.
    pub destination: usize,
}

/// Pick the best slot for `point` among insertion positions `first..=len`.
///
/// Position `p` means "insert before index `p`", i.e. right after the slot
/// at `p - 1`. `best` is the fallback position and its distance.
fn best_position<P, D>(
    points: &[Option<P>],
    first: usize,
    point: P,
    mut best: (usize, u32),
    distance: &D,
) -> usize
where
    P: Copy + PartialEq,
    D: Fn(P, P) -> u32,
{
    // Exact colocation wins outright.
    if best.1 > 0 {
        if let Some(p) = (first..=points.len()).find(|p| points[p - 1] == Some(point)) {
            return p;
        }
    }
    for p in first..=points.len() {
        if best.1 == 0 {
            break;
        }
        let Some(at) = points[p - 1] else {
            continue;
        };
        let d = distance(at, point);
        if d < best.1 {
            best = (p, d);
        }
    }
    best.0
}

/// Plan where a new item's slots go.
///
/// `points` are the points of the existing slots, `carrier_at` is where the
/// carrier is now, `source` is the pickup point (`None` if the item is
/// already aboard) and `destination` the drop-off point.
pub fn plan_insertion<P, D>(
    points: &[Option<P>],
    carrier_at: P,
    source: Option<P>,
    destination: P,
    distance: D,
) -> Insertion
where
    P: Copy + PartialEq,
    D: Fn(P, P) -> u32,
{
    match source {
        Some(source) => {
            let anchor = (0, distance(carrier_at, source));
            let source_index = best_position(points, 1, source, anchor, &distance);
            let mut after: Vec<Option<P>> = points.to_vec();
            after.insert(source_index, Some(source));
            let destination_index = best_position(
                &after,
                source_index + 2,
                destination,
                (source_index + 1, distance(source, destination)),
                &distance,
            );
            Insertion {
                source: Some(source_index),
                destination: destination_index,
            }
        }
        None => Insertion {
            source: None,
            destination: best_position(
                points,
                1,
                destination,
                (0, distance(carrier_at, destination)),
                &distance,
            ),
        },
    }
}

/// Insert an item into a manifest, returning the new manifest.
///
/// An item that is already listed leaves the manifest unchanged.
pub fn insert<T, P, D>(
    stops: &[Stop<T, P>],
    item: T,
    carrier_at: P,
    source: Option<P>,
    destination: P,
    distance: D,
) -> Vec<Stop<T, P>>
where
    T: Copy + PartialEq,
    P: Copy + PartialEq,
    D: Fn(P, P) -> u32,
{
    if stops.iter().any(|s| s.item == item) {
        return stops.to_vec();
    }
    let points: Vec<Option<P>> = stops.iter().map(|s| s.point).collect();
    let plan = plan_insertion(&points, carrier_at, source, destination, distance);
    let mut out = stops.to_vec();
    if let (Some(index), Some(point)) = (plan.source, source) {
        out.insert(
            index,
            Stop {
                item,
                point: Some(point),
            },
        );
    }
    out.insert(
        plan.destination,
        Stop {
            item,
            point: Some(destination),
        },
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(a: i32, b: i32) -> u32 {
        a.abs_diff(b)
    }

    fn stop(item: char, point: i32) -> Stop<char, i32> {
        Stop {
            item,
            point: Some(point),
        }
    }

    fn items(stops: &[Stop<char, i32>]) -> String {
        stops.iter().map(|s| s.item).collect()
    }

    #[test]
    fn test_first_item_goes_pickup_then_dropoff() {
        let out = insert(&[], 'a', 0, Some(2), 5, line);
        assert_eq!(items(&out), "aa");
        assert_eq!(out[0].point, Some(2));
        assert_eq!(out[1].point, Some(5));
    }

    #[test]
    fn test_aboard_item_takes_one_slot() {
        let out = insert(&[], 'a', 0, None, 5, line);
        assert_eq!(items(&out), "a");
    }

    #[test]
    fn test_colocated_pickup_follows_matching_slot() {
        let stops = [stop('a', 4), stop('a', 9)];
        let plan = plan_insertion(&[Some(4), Some(9)], 0, Some(9), 12, line);
        assert_eq!(plan.source, Some(2));
        let out = insert(&stops, 'b', 0, Some(9), 12, line);
        assert_eq!(items(&out), "aabb");
    }

    #[test]
    fn test_pickup_at_carrier_goes_first() {
        let stops = [stop('z', 1)];
        let out = insert(&stops, 'y', 0, Some(3), 6, line);
        let out = insert(&out, 'x', 0, Some(0), 2, line);
        assert_eq!(out[0].item, 'x');
        let x = out.iter().position(|s| s.item == 'x').unwrap();
        let y = out.iter().position(|s| s.item == 'y').unwrap();
        assert!(x < y);
    }

    #[test]
    fn test_destination_defaults_right_after_pickup() {
        // nothing after the pickup is closer to 50 than the pickup itself
        let plan = plan_insertion(&[Some(5), Some(1)], 0, Some(5), 50, line);
        assert_eq!(plan.source, Some(1));
        assert_eq!(plan.destination, 2);
    }

    #[test]
    fn test_destination_never_precedes_pickup() {
        // the pickup sits at the carrier, the drop-off joins the slot at 10
        let plan = plan_insertion(&[Some(10), Some(3)], 3, Some(3), 10, line);
        let source = plan.source.unwrap();
        assert_eq!(source, 0);
        assert_eq!(plan.destination, 2);
    }

    #[test]
    fn test_distance_tie_keeps_earliest_slot() {
        // 2 and 8 are both three away from 5
        let plan = plan_insertion(&[Some(2), Some(8)], 0, None, 5, line);
        assert_eq!(plan.destination, 1);
    }

    #[test]
    fn test_second_insert_is_a_no_op() {
        let once = insert(&[], 'a', 0, Some(2), 5, line);
        let twice = insert(&once, 'a', 0, Some(7), 1, line);
        assert_eq!(once, twice);
    }
}
