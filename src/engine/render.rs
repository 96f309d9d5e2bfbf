use std::collections::HashMap;

use serde::Serialize;

use crate::data::UpdateKind;
use crate::domain::{Point, Series};
use crate::indicators::IndicatorKind;

/// Which series on a pane an operation is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RenderTarget {
    Candles,
    Line {
        indicator: IndicatorKind,
        name: &'static str,
    },
}

/// The only two operations a render surface receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RenderOp {
    /// Full replace
    SetData { target: RenderTarget, series: Series },
    /// Append a point, or overwrite the last one when `kind` is `Replace`
    Update {
        target: RenderTarget,
        point: Point,
        kind: UpdateKind,
    },
}

impl RenderOp {
    pub fn target(&self) -> RenderTarget {
        match self {
            RenderOp::SetData { target, .. } | RenderOp::Update { target, .. } => *target,
        }
    }
}

/// Collapse runs of replaces of the same bucket into the latest value.
///
/// A replace only folds into an earlier replace of the same target and time with
/// nothing else for that target in between; appends and full replaces are kept as is.
pub fn coalesce_updates(ops: Vec<RenderOp>) -> Vec<RenderOp> {
    let mut out: Vec<RenderOp> = Vec::with_capacity(ops.len());
    let mut last_for_target: HashMap<RenderTarget, usize> = HashMap::new();

    for op in ops {
        if let RenderOp::Update {
            target,
            point,
            kind: UpdateKind::Replace,
        } = &op
        {
            if let Some(&idx) = last_for_target.get(target) {
                if let RenderOp::Update {
                    point: prev_point,
                    kind: UpdateKind::Replace,
                    ..
                } = &mut out[idx]
                {
                    if prev_point.time() == point.time() {
                        *prev_point = *point;
                        continue;
                    }
                }
            }
        }
        last_for_target.insert(op.target(), out.len());
        out.push(op);
    }
    out
}
