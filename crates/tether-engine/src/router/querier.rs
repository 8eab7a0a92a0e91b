//! Query role: ray and shape casts answered into the results buffer.
//!
//! Every query produces exactly one hits frame, even when nothing was hit
//! or the backend failed, so the caller can retire its correlation id.

use tether_backend::{
    BackendHit, CastFilter, HitPolicy, Payload, QueryHit, RayQuery, ShapeQuery,
};
use tether_buffer::CommandBuffer;
use tether_core::{CorrelationId, DispatchError, EngineError, Index, QueryOp};

use super::{ensure_complete, Outcome, RouteContext};
use crate::report::write_query_hits;

/// Filter fields shared by both query kinds.
struct Filters {
    policy: HitPolicy,
    ignore: Option<Index>,
    layer_mask: Option<u32>,
    want_normals: bool,
}

impl Filters {
    fn resolve(&self, ctx: &RouteContext<'_>) -> CastFilter {
        CastFilter {
            policy: self.policy,
            ignore: self
                .ignore
                .and_then(|i| ctx.tracker.get(i))
                .map(|o| o.native),
            layer_mask: self.layer_mask.unwrap_or(u32::MAX),
            want_normals: self.want_normals,
        }
    }
}

/// Decode one query, cast it, and write its hits frame.
pub fn query(
    op: QueryOp,
    buf: &mut CommandBuffer,
    ctx: &mut RouteContext<'_>,
) -> Result<Outcome, DispatchError> {
    let (correlation, filters, result) = match op {
        QueryOp::Ray => {
            let q = RayQuery::decode(buf)?;
            ensure_complete(buf)?;
            let filters = Filters {
                policy: q.policy,
                ignore: q.ignore,
                layer_mask: q.layer_mask,
                want_normals: q.want_normals,
            };
            let filter = filters.resolve(ctx);
            let result = ctx.backend.cast_ray(q.origin, q.direction, &filter);
            (q.correlation, filters, result)
        }
        QueryOp::Shape => {
            let q = ShapeQuery::decode(buf)?;
            ensure_complete(buf)?;
            let filters = Filters {
                policy: q.policy,
                ignore: q.ignore,
                layer_mask: q.layer_mask,
                want_normals: q.want_normals,
            };
            let filter = filters.resolve(ctx);
            let result = ctx
                .backend
                .cast_shape(&q.shape, &q.start, q.direction, &filter);
            (q.correlation, filters, result)
        }
    };
    Ok(answer(correlation, &filters, result, ctx))
}

fn answer(
    correlation: CorrelationId,
    filters: &Filters,
    result: Result<Vec<BackendHit>, EngineError>,
    ctx: &mut RouteContext<'_>,
) -> Outcome {
    match result {
        Ok(raw) => {
            let hits = map_hits(raw, filters, ctx);
            log::trace!("query {correlation}: {} hits", hits.len());
            write_query_hits(ctx.results, correlation, &hits);
            Outcome::Applied
        }
        Err(e) => {
            write_query_hits(ctx.results, correlation, &[]);
            Outcome::failed(&e, None)
        }
    }
}

/// Translate backend hits to caller indices, nearest first.
///
/// Hits on objects the tracker does not know are dropped.
fn map_hits(raw: Vec<BackendHit>, filters: &Filters, ctx: &RouteContext<'_>) -> Vec<QueryHit> {
    let mut hits: Vec<QueryHit> = raw
        .into_iter()
        .filter_map(|h| {
            let index = ctx.tracker.index_of(h.native)?;
            Some(QueryHit {
                index,
                point: h.point,
                normal: h.normal.filter(|_| filters.want_normals),
                fraction: h.fraction,
            })
        })
        .collect();
    hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
    if filters.policy == HitPolicy::First {
        hits.truncate(1);
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::super::tests::Harness;
    use super::*;
    use tether_backend::{Command, ShapeDesc};
    use tether_core::{Pose, Vec3};
    use tether_test_utils::fixtures;

    use crate::report::Report;

    fn column(h: &mut Harness) {
        let mut buf = CommandBuffer::new();
        for (i, y) in [(0u32, 1.0f32), (1, 3.0), (2, 5.0)] {
            fixtures::anchor(i, Vec3::new(0.0, y, 0.0)).write_to(&mut buf);
        }
        h.route(&mut buf).unwrap();
    }

    fn hits_for(reports: &[Report], id: u32) -> Vec<QueryHit> {
        reports
            .iter()
            .find_map(|r| match r {
                Report::QueryHits { correlation, hits } if correlation.0 == id => {
                    Some(hits.clone())
                }
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn all_hits_sorted_nearest_first() {
        let mut h = Harness::new();
        column(&mut h);
        let mut q = RayQuery::new(CorrelationId(1), Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y * 20.0);
        q.policy = HitPolicy::All;
        let mut buf = CommandBuffer::new();
        q.write_to(&mut buf);
        h.route(&mut buf).unwrap();

        let hits = hits_for(&h.reports(), 1);
        let order: Vec<u32> = hits.iter().map(|hit| hit.index.0).collect();
        assert_eq!(order, vec![2, 1, 0]);
        assert!(hits.windows(2).all(|w| w[0].fraction <= w[1].fraction));
    }

    #[test]
    fn first_policy_and_ignore() {
        let mut h = Harness::new();
        column(&mut h);
        let mut q = RayQuery::new(CorrelationId(2), Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y * 20.0);
        q.ignore = Some(Index(2));
        q.want_normals = false;
        let mut buf = CommandBuffer::new();
        q.write_to(&mut buf);
        h.route(&mut buf).unwrap();

        let hits = hits_for(&h.reports(), 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, Index(1));
        assert_eq!(hits[0].normal, None);
    }

    #[test]
    fn every_query_is_answered_once() {
        let mut h = Harness::new();
        column(&mut h);
        let mut buf = CommandBuffer::new();
        RayQuery::new(CorrelationId(10), Vec3::new(50.0, 0.0, 0.0), Vec3::X).write_to(&mut buf);
        RayQuery::new(CorrelationId(11), Vec3::new(f32::NAN, 0.0, 0.0), Vec3::X)
            .write_to(&mut buf);
        ShapeQuery {
            correlation: CorrelationId(12),
            shape: ShapeDesc::Sphere { radius: 0.25 },
            start: Pose::from_position(Vec3::new(0.0, 10.0, 0.0)),
            direction: Vec3::NEG_Y * 20.0,
            policy: HitPolicy::First,
            ignore: None,
            layer_mask: None,
            want_normals: true,
        }
        .write_to(&mut buf);

        let stats = h.route(&mut buf).unwrap();
        assert_eq!(stats.failed, 1);
        let reports = h.reports();
        let answered: Vec<u32> = reports
            .iter()
            .filter_map(|r| match r {
                Report::QueryHits { correlation, .. } => Some(correlation.0),
                _ => None,
            })
            .collect();
        assert_eq!(answered, vec![10, 11, 12]);
        assert!(hits_for(&reports, 10).is_empty());
        assert!(hits_for(&reports, 11).is_empty());
        assert_eq!(hits_for(&reports, 12)[0].index, Index(2));
    }

    #[test]
    fn layer_mask_filters() {
        let mut h = Harness::new();
        let mut buf = CommandBuffer::new();
        let mut body = fixtures::anchor(0, Vec3::ZERO);
        body.layers = 0b100;
        body.write_to(&mut buf);
        let mut q = RayQuery::new(CorrelationId(3), Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y * 10.0);
        q.layer_mask = Some(0b011);
        q.write_to(&mut buf);
        h.route(&mut buf).unwrap();

        assert!(hits_for(&h.reports(), 3).is_empty());
    }
}
