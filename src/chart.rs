// 🥧 Contribution charts
//
// A pie chart is a plain value built from labels and values. The registry
// holds at most one chart per transaction, so showing it again replaces the
// old instance and hiding or deleting releases it.

use crate::ledger::{Ledger, Transaction};
use std::collections::HashMap;
use std::f64::consts::TAU;
use uuid::Uuid;

/// Slice colours, cycled when there are more slices than entries
pub const PALETTE: [(u8, u8, u8); 4] = [
    (0x2e, 0xcc, 0x71),
    (0x34, 0x98, 0xdb),
    (0xe7, 0x4c, 0x3c),
    (0xf1, 0xc4, 0x0f),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    /// Share of the whole pie, 0.0..=1.0
    pub fraction: f64,
    pub color: (u8, u8, u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieChart {
    pub title: String,
    pub slices: Vec<Slice>,
}

impl PieChart {
    /// Labels and values are paired up; extra entries on either side are dropped.
    /// Negative values count as zero.
    pub fn new(title: &str, labels: Vec<String>, values: Vec<f64>) -> Self {
        let values: Vec<f64> = values.into_iter().map(|v| v.max(0.0)).collect();
        let total: f64 = values.iter().take(labels.len()).sum();

        let slices = labels
            .into_iter()
            .zip(values)
            .enumerate()
            .map(|(i, (label, value))| Slice {
                label,
                value,
                fraction: if total > 0.0 { value / total } else { 0.0 },
                color: PALETTE[i % PALETTE.len()],
            })
            .collect();

        PieChart {
            title: title.to_string(),
            slices,
        }
    }

    pub fn from_transaction(transaction: &Transaction) -> Self {
        let (labels, values): (Vec<String>, Vec<f64>) = transaction
            .contributors
            .iter()
            .map(|c| (c.name.clone(), c.amount))
            .unzip();
        PieChart::new(&transaction.description, labels, values)
    }

    pub fn total(&self) -> f64 {
        self.slices.iter().map(|s| s.value).sum()
    }

    /// Slice covering `angle`, measured clockwise from twelve o'clock in radians
    pub fn slice_at_angle(&self, angle: f64) -> Option<usize> {
        let position = angle.rem_euclid(TAU) / TAU;
        let mut start = 0.0;
        for (i, slice) in self.slices.iter().enumerate() {
            let end = start + slice.fraction;
            if slice.fraction > 0.0 && position >= start && position < end {
                return Some(i);
            }
            start = end;
        }
        // Float residue at the very end of the circle belongs to the last visible slice
        self.slices.iter().rposition(|s| s.fraction > 0.0)
    }

    /// Sample a unit disc on a grid of `step` and bucket the points per slice.
    /// Index `i` of the result holds the points of slice `i`.
    pub fn raster(&self, step: f64) -> Vec<Vec<(f64, f64)>> {
        let mut layers = vec![Vec::new(); self.slices.len()];
        if step <= 0.0 || self.total() <= 0.0 {
            return layers;
        }

        let steps = (2.0 / step).ceil() as i64;
        for yi in 0..=steps {
            let y = -1.0 + yi as f64 * step;
            for xi in 0..=steps {
                let x = -1.0 + xi as f64 * step;
                if x * x + y * y > 1.0 {
                    continue;
                }
                // atan2(x, y) runs clockwise from the positive y axis
                if let Some(i) = self.slice_at_angle(x.atan2(y)) {
                    layers[i].push((x, y));
                }
            }
        }
        layers
    }
}

// ============================================================================
// CHART REGISTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartVisibility {
    Shown,
    Hidden,
}

/// Live charts keyed by transaction id
#[derive(Debug, Default)]
pub struct ChartRegistry {
    charts: HashMap<Uuid, PieChart>,
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, transaction_id: Uuid) -> Option<&PieChart> {
        self.charts.get(&transaction_id)
    }

    pub fn is_shown(&self, transaction_id: Uuid) -> bool {
        self.charts.contains_key(&transaction_id)
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Create the chart, replacing any previous one for the same transaction
    pub fn show(&mut self, transaction: &Transaction) -> &PieChart {
        self.charts.insert(transaction.id, PieChart::from_transaction(transaction));
        &self.charts[&transaction.id]
    }

    pub fn hide(&mut self, transaction_id: Uuid) -> bool {
        self.charts.remove(&transaction_id).is_some()
    }

    pub fn toggle(&mut self, transaction: &Transaction) -> ChartVisibility {
        if self.hide(transaction.id) {
            ChartVisibility::Hidden
        } else {
            self.show(transaction);
            ChartVisibility::Shown
        }
    }

    /// Rebuild shown charts from the ledger and release those whose
    /// transaction is gone
    pub fn sync(&mut self, ledger: &Ledger) {
        self.charts.retain(|id, _| ledger.get(*id).is_some());
        for (id, chart) in self.charts.iter_mut() {
            if let Some(tx) = ledger.get(*id) {
                *chart = PieChart::from_transaction(tx);
            }
        }
    }
}
