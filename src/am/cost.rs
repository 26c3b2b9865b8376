use crate::core::config::Config;
use crate::core::stats::{CostEstimate, CostInputs};

/// Generic index cost: one random page read per index page touched plus a
/// per-tuple CPU charge for every scan key. Repeated scans share the pages
/// they fetched.
pub fn cost_estimate(config: &Config, inputs: &CostInputs) -> CostEstimate {
    let selectivity = inputs.selectivity.clamp(0.0, 1.0);

    let mut num_tuples = (selectivity * inputs.index_tuples).round();
    if num_tuples > inputs.index_tuples {
        num_tuples = inputs.index_tuples;
    }
    if num_tuples < 1.0 {
        num_tuples = 1.0;
    }

    let num_pages = if inputs.index_pages > 1.0 && inputs.index_tuples > 1.0 {
        (num_tuples * inputs.index_pages / inputs.index_tuples).ceil()
    } else {
        1.0
    };

    let loop_count = inputs.loop_count.max(1.0);
    let page_cost = if loop_count > 1.0 {
        let fetched = pages_fetched(num_tuples * loop_count, inputs.index_pages.max(1.0));
        fetched * config.random_page_cost / loop_count
    } else {
        num_pages * config.random_page_cost
    };

    let qual_op_cost = config.cpu_operator_cost * inputs.num_keys as f64;
    let total_cost = page_cost + num_tuples * (config.cpu_index_tuple_cost + qual_op_cost);

    CostEstimate {
        startup_cost: 0.0,
        total_cost,
        selectivity,
        correlation: 0.0,
    }
}

/// Mackert-Lohman estimate of distinct pages read by `tuples` fetches from
/// `pages` pages that stay cached.
fn pages_fetched(tuples: f64, pages: f64) -> f64 {
    let fetched = (2.0 * pages * tuples) / (2.0 * pages + tuples);
    fetched.min(pages).ceil()
}
