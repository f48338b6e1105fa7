use crate::errors::EngineResult;
use crate::models::{ModelInputs, OptionParameters, OptionType, PricingModel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Samples per axis
pub const GRID_POINTS: usize = 20;

/// Spot axis spans [SPOT_LOW * S0, SPOT_HIGH * S0]
const SPOT_LOW: f64 = 0.5;
const SPOT_HIGH: f64 = 1.5;

/// Volatility axis bounds (absolute, independent of the request's volatility)
const VOL_MIN: f64 = 0.10;
const VOL_MAX: f64 = 0.50;

/// Value and P&L across a spot × volatility grid.
///
/// Every matrix is indexed `[vol_index][spot_index]`. A P&L cell is 0.0 when
/// no purchase price was supplied for that side, since the grid is rendered as
/// a dense matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMapGrid {
    #[serde(rename = "spot_prices")]
    pub spot_axis: Vec<f64>,
    #[serde(rename = "volatilities")]
    pub vol_axis: Vec<f64>,
    #[serde(rename = "call_values")]
    pub call_value: Vec<Vec<f64>>,
    #[serde(rename = "put_values")]
    pub put_value: Vec<Vec<f64>>,
    pub call_pnl: Vec<Vec<f64>>,
    pub put_pnl: Vec<Vec<f64>>,
}

/// One volatility row of all four matrices.
#[derive(Default)]
struct GridRow {
    call_value: Vec<f64>,
    put_value: Vec<f64>,
    call_pnl: Vec<f64>,
    put_pnl: Vec<f64>,
}

/// `n` evenly spaced points from `start` to `end` inclusive. Endpoints are exact.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Sweep spot and volatility around `params`, pricing a call and a put at every cell.
///
/// Strike, maturity, rate and purchase prices are held fixed, so the request is
/// validated once before the sweep; the sweep either returns a full grid or
/// the first InvalidArgument.
pub fn sweep(model: &dyn PricingModel, params: &OptionParameters) -> EngineResult<HeatMapGrid> {
    ModelInputs::from_params(params)?;

    let spot_axis = linspace(params.spot_price * SPOT_LOW, params.spot_price * SPOT_HIGH, GRID_POINTS);
    let vol_axis = linspace(VOL_MIN, VOL_MAX, GRID_POINTS);

    let rows = vol_axis
        .par_iter()
        .map(|&vol| price_row(model, params, &spot_axis, vol))
        .collect::<EngineResult<Vec<GridRow>>>()?;

    let mut grid = HeatMapGrid {
        spot_axis,
        vol_axis,
        call_value: Vec::with_capacity(GRID_POINTS),
        put_value: Vec::with_capacity(GRID_POINTS),
        call_pnl: Vec::with_capacity(GRID_POINTS),
        put_pnl: Vec::with_capacity(GRID_POINTS),
    };
    for row in rows {
        grid.call_value.push(row.call_value);
        grid.put_value.push(row.put_value);
        grid.call_pnl.push(row.call_pnl);
        grid.put_pnl.push(row.put_pnl);
    }

    tracing::debug!(
        model = model.name(),
        spot = params.spot_price,
        strike = params.strike_price,
        "heat map computed"
    );

    Ok(grid)
}

fn price_row(
    model: &dyn PricingModel,
    params: &OptionParameters,
    spot_axis: &[f64],
    vol: f64,
) -> EngineResult<GridRow> {
    let mut row = GridRow {
        call_value: Vec::with_capacity(spot_axis.len()),
        put_value: Vec::with_capacity(spot_axis.len()),
        call_pnl: Vec::with_capacity(spot_axis.len()),
        put_pnl: Vec::with_capacity(spot_axis.len()),
    };

    for &spot in spot_axis {
        let call = model.price(&params.at_point(spot, vol, OptionType::Call))?;
        row.call_value.push(call.price);
        row.call_pnl.push(call.call_pnl.unwrap_or(0.0));

        let put = model.price(&params.at_point(spot, vol, OptionType::Put))?;
        row.put_value.push(put.price);
        row.put_pnl.push(put.put_pnl.unwrap_or(0.0));
    }

    Ok(row)
}
