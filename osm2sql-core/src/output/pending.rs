//! Parallel rendering of pending ways and relations.
//!
//! Pending ids are split into disjoint partitions by `id % workers`. Each
//! partition renders on its own rayon task against the shared read-only
//! middle; the caller writes the results and marks ids done on one thread,
//! so no id is ever finished twice.

use rayon::prelude::*;

use super::render::{RelationRows, Renderer, Row};
use crate::OsmId;
use crate::middle::{MiddleError, MiddleQuery};

/// Split `ids` into `workers` disjoint partitions by id modulo.
pub(crate) fn partition(ids: &[OsmId], workers: usize) -> Vec<Vec<OsmId>> {
    let workers = workers.max(1);
    let mut parts = vec![Vec::new(); workers];
    let modulus = i64::try_from(workers).unwrap_or(i64::MAX);
    for id in ids {
        let slot = usize::try_from(id.rem_euclid(modulus)).unwrap_or(0);
        if let Some(part) = parts.get_mut(slot) {
            part.push(*id);
        }
    }
    parts
}

/// Render every pending way. Ids missing from the middle render nothing.
/// Results come back in ascending id order.
pub(crate) fn render_ways<Q>(
    middle: &Q,
    renderer: Renderer<'_>,
    ids: &[OsmId],
    workers: usize,
) -> Result<Vec<(OsmId, Vec<Row>)>, MiddleError>
where
    Q: MiddleQuery + ?Sized,
{
    let parts = partition(ids, workers);
    let rendered: Vec<Vec<(OsmId, Vec<Row>)>> = parts
        .par_iter()
        .map(|part| -> Result<Vec<(OsmId, Vec<Row>)>, MiddleError> {
            let ways = middle.ways_get_list(part)?;
            Ok(ways
                .iter()
                .map(|way| (way.id, renderer.stored_way_rows(way)))
                .collect())
        })
        .collect::<Result<_, MiddleError>>()?;
    let mut flat: Vec<(OsmId, Vec<Row>)> = rendered.into_iter().flatten().collect();
    flat.sort_by_key(|(id, _)| *id);
    Ok(flat)
}

/// Render every pending relation. Results come back in ascending id order.
pub(crate) fn render_relations<Q>(
    middle: &Q,
    renderer: Renderer<'_>,
    ids: &[OsmId],
    workers: usize,
) -> Result<Vec<(OsmId, Option<RelationRows>)>, MiddleError>
where
    Q: MiddleQuery + ?Sized,
{
    let parts = partition(ids, workers);
    let rendered: Vec<Vec<(OsmId, Option<RelationRows>)>> = parts
        .par_iter()
        .map(|part| {
            part.iter()
                .map(|id| {
                    let rows = match middle.relations_get(*id)? {
                        Some(relation) => renderer.relation_rows(middle, &relation)?,
                        None => None,
                    };
                    Ok((*id, rows))
                })
                .collect::<Result<Vec<_>, MiddleError>>()
        })
        .collect::<Result<_, MiddleError>>()?;
    let mut flat: Vec<(OsmId, Option<RelationRows>)> = rendered.into_iter().flatten().collect();
    flat.sort_by_key(|(id, _)| *id);
    Ok(flat)
}
