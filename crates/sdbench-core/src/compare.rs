//! Cross-agent comparison: Pareto frontier and summary statistics.

use serde::{Deserialize, Serialize};

use crate::domain::BenchmarkResult;

/// Accuracy/cost point for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPoint {
    pub agent_name: String,
    pub diagnostic_accuracy: f64,
    pub average_cost: f64,
}

impl From<&BenchmarkResult> for AgentPoint {
    fn from(r: &BenchmarkResult) -> Self {
        Self {
            agent_name: r.agent_name.clone(),
            diagnostic_accuracy: r.diagnostic_accuracy,
            average_cost: r.average_cost,
        }
    }
}

/// Accuracy per dollar for the most efficient agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Efficiency {
    pub agent_name: String,
    pub accuracy_per_dollar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentComparison {
    pub best_accuracy: Option<AgentPoint>,
    pub lowest_cost: Option<AgentPoint>,
    /// Only agents with a positive average cost are considered.
    pub best_efficiency: Option<Efficiency>,
    pub accuracy_mean: f64,
    pub accuracy_std: f64,
    pub cost_mean: f64,
    pub cost_std: f64,
    pub pareto_frontier: Vec<AgentPoint>,
}

/// Cheapest-first frontier of cost/accuracy trade-offs.
///
/// Walking results by ascending cost, a result joins when it beats the last
/// frontier point on accuracy, or ties it at a lower cost.
pub fn pareto_frontier(results: &[BenchmarkResult]) -> Vec<AgentPoint> {
    let mut points: Vec<AgentPoint> = results.iter().map(AgentPoint::from).collect();
    if points.len() < 2 {
        return points;
    }
    points.sort_by(|a, b| a.average_cost.total_cmp(&b.average_cost));

    let mut frontier: Vec<AgentPoint> = Vec::new();
    for p in points {
        let joins = match frontier.last() {
            None => true,
            Some(last) => {
                p.diagnostic_accuracy > last.diagnostic_accuracy
                    || (p.diagnostic_accuracy == last.diagnostic_accuracy
                        && p.average_cost < last.average_cost)
            }
        };
        if joins {
            frontier.push(p);
        }
    }
    frontier
}

/// Population mean and standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub fn compare_results(results: &[BenchmarkResult]) -> AgentComparison {
    let best_accuracy = results
        .iter()
        .max_by(|a, b| a.diagnostic_accuracy.total_cmp(&b.diagnostic_accuracy))
        .map(AgentPoint::from);
    let lowest_cost = results
        .iter()
        .min_by(|a, b| a.average_cost.total_cmp(&b.average_cost))
        .map(AgentPoint::from);
    let best_efficiency = results
        .iter()
        .filter(|r| r.average_cost > 0.0)
        .map(|r| Efficiency {
            agent_name: r.agent_name.clone(),
            accuracy_per_dollar: r.diagnostic_accuracy / r.average_cost,
        })
        .max_by(|a, b| a.accuracy_per_dollar.total_cmp(&b.accuracy_per_dollar));

    let accuracies: Vec<f64> = results.iter().map(|r| r.diagnostic_accuracy).collect();
    let costs: Vec<f64> = results.iter().map(|r| r.average_cost).collect();
    let (accuracy_mean, accuracy_std) = mean_std(&accuracies);
    let (cost_mean, cost_std) = mean_std(&costs);

    AgentComparison {
        best_accuracy,
        lowest_cost,
        best_efficiency,
        accuracy_mean,
        accuracy_std,
        cost_mean,
        cost_std,
        pareto_frontier: pareto_frontier(results),
    }
}
