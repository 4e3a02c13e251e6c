//! Chart Builder: picks a Vega-Lite template for a query result and fills it with the data

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::assistant::AssistantError;
use crate::assistant::agent_executor::{AgentExecuteParams, prompt_checked};
use crate::assistant::context::AssistantContext;
use crate::llm::structured::{clean_json, strip_code_fences};
use crate::warehouse::QueryResult;

pub const CHOOSE_TAG: &str = "chart_agent.choose";
pub const SPEC_TAG: &str = "chart_agent.spec";

/// Seed of the random part of the sample, so the same result always yields the same sample.
const SAMPLE_SEED: u64 = 1;

/// A finished chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// Template key the chart was built from
    pub visualization: String,
    /// Vega-Lite spec with the full dataset in `data.values`
    pub spec: Value,
}

fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|datetime| datetime.naive_utc())
}

/// A column is numeric when it has at least one value and every non-null value is a number.
fn is_numeric_column(result: &QueryResult, index: usize) -> bool {
    let mut seen = false;
    for value in result.column_values(index) {
        match value {
            Value::Null => {}
            Value::Number(_) => seen = true,
            _ => return false,
        }
    }
    seen
}

fn is_date_column(result: &QueryResult, index: usize) -> bool {
    let mut seen = false;
    for value in result.column_values(index) {
        if value.is_null() {
            continue;
        }
        if parse_date(value).is_none() {
            return false;
        }
        seen = true;
    }
    seen
}

/// Row index of the first minimum and the first maximum of `key` over the rows.
fn extreme_rows<K, F>(result: &QueryResult, key: F) -> Option<(usize, usize)>
where
    K: PartialOrd + Clone,
    F: Fn(&[Value]) -> Option<K>,
{
    let mut min: Option<(usize, K)> = None;
    let mut max: Option<(usize, K)> = None;
    for (i, row) in result.rows.iter().enumerate() {
        let Some(value) = key(row.as_slice()) else {
            continue;
        };
        if min.as_ref().is_none_or(|(_, m)| value < *m) {
            min = Some((i, value.clone()));
        }
        if max.as_ref().is_none_or(|(_, m)| value > *m) {
            max = Some((i, value));
        }
    }
    Some((min?.0, max?.0))
}

fn push_unique(picked: &mut Vec<usize>, index: usize) {
    if !picked.contains(&index) {
        picked.push(index);
    }
}

/// Picks at most `count` representative rows.
///
/// The sample holds one row at the minimum and one at the maximum of every numeric
/// column, the rows with the first and last date of the first date column, then a
/// seeded random pick of the remaining rows.
pub fn sample(result: &QueryResult, count: usize) -> QueryResult {
    let mut picked: Vec<usize> = Vec::new();

    for column in 0..result.columns.len() {
        if !is_numeric_column(result, column) {
            continue;
        }
        if let Some((min, max)) =
            extreme_rows(result, |row| row.get(column).and_then(Value::as_f64))
        {
            push_unique(&mut picked, min);
            push_unique(&mut picked, max);
        }
    }

    if let Some(date_column) = (0..result.columns.len()).find(|&c| is_date_column(result, c))
        && let Some((first, last)) =
            extreme_rows(result, |row| row.get(date_column).and_then(parse_date))
    {
        push_unique(&mut picked, first);
        push_unique(&mut picked, last);
    }

    let remaining: Vec<usize> = (0..result.row_count())
        .filter(|i| !picked.contains(i))
        .collect();
    let wanted = count.saturating_sub(picked.len()).min(remaining.len());
    if wanted > 0 {
        let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
        for position in rand::seq::index::sample(&mut rng, remaining.len(), wanted) {
            picked.push(remaining[position]);
        }
    }

    picked.truncate(count);
    result.select_rows(&picked)
}

/// Resolves a model answer to a template key: exact match first, then case-insensitive.
pub fn resolve_visualization(answer: &str, templates: &Map<String, Value>) -> Result<String> {
    let cleaned = strip_code_fences(answer)
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`' || c == '.')
        .trim()
        .to_string();

    if templates.contains_key(&cleaned) {
        return Ok(cleaned);
    }
    if let Some(key) = templates
        .keys()
        .find(|key| key.eq_ignore_ascii_case(&cleaned))
    {
        return Ok(key.clone());
    }
    Err(AssistantError::UnknownVisualization {
        choice: cleaned,
        available: templates.keys().cloned().collect::<Vec<_>>().join(", "),
    }
    .into())
}

/// Parses a chart answer as a JSON object, falling back to its outermost `{ ... }`.
pub fn parse_spec(raw: &str) -> Result<Value> {
    let parsed = serde_json::from_str::<Value>(raw.trim())
        .or_else(|_| serde_json::from_str::<Value>(clean_json(raw)))?;
    if parsed.is_object() {
        Ok(parsed)
    } else {
        Err(anyhow!("the chart spec is not a JSON object"))
    }
}

/// Puts the full dataset into `spec.data.values`.
pub fn inject_data(mut spec: Value, result: &QueryResult) -> Value {
    let values = Value::Array(result.to_records());
    if let Value::Object(root) = &mut spec {
        let data = root
            .entry("data")
            .or_insert_with(|| Value::Object(Map::new()));
        if !data.is_object() {
            *data = Value::Object(Map::new());
        }
        if let Value::Object(data) = data {
            data.insert("values".to_string(), values);
        }
    }
    spec
}

#[derive(Default)]
pub struct ChartAgent;

impl ChartAgent {
    pub async fn choose_visualization(
        &self,
        context: &AssistantContext,
        sample: &QueryResult,
        row_count: usize,
        additional_prompt: &str,
    ) -> Result<String> {
        let guide = serde_json::to_string_pretty(&context.resources.visualization_guide)
            .unwrap_or_default();
        let system_prompt = format!(
            "{}\nThe available visualizations are:\n{}\nValid names: {}",
            include_str!("prompts/chart_choose_sys.tpl"),
            guide,
            context.resources.visualization_names()
        );
        let user_prompt = format!(
            "Return the name of the visualization that best describes this data:\n{}\n\
             The sample holds the numeric bounds plus random rows. The real data has {} rows.\n\
             Additional request from the user: {}",
            sample.render(sample.row_count()),
            row_count,
            additional_prompt
        );

        let templates = &context.resources.visualization_templates;
        prompt_checked(
            context,
            AgentExecuteParams::new(CHOOSE_TAG, system_prompt, user_prompt),
            |answer| resolve_visualization(answer, templates),
        )
        .await?
    }

    pub async fn create_visualization(
        &self,
        context: &AssistantContext,
        choice: &str,
        sample: &QueryResult,
        row_count: usize,
        additional_prompt: &str,
    ) -> Result<Value> {
        let template = context
            .resources
            .visualization_templates
            .get(choice)
            .ok_or_else(|| AssistantError::UnknownVisualization {
                choice: choice.to_string(),
                available: context.resources.visualization_names(),
            })?;
        let system_prompt = format!(
            "{}\nYou are generating a {} chart. Return JSON shaped like this template:\n{}",
            include_str!("prompts/chart_spec_sys.tpl"),
            choice,
            template
        );
        let base_prompt = format!(
            "Return a Vega-Lite spec for this sample data in the {} format:\n{}\n\
             There will be {} rows in total.\n\
             Additional request from the user: {}",
            choice,
            serde_json::to_string(&sample.to_records())?,
            row_count,
            additional_prompt
        );

        let attempts = context.config.assistant.max_chart_attempts.max(1);
        let mut user_prompt = base_prompt.clone();
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let parsed = prompt_checked(
                context,
                AgentExecuteParams::new(SPEC_TAG, system_prompt.clone(), user_prompt.clone()),
                parse_spec,
            )
            .await?;
            match parsed {
                Ok(spec) => return Ok(spec),
                Err(e) => {
                    warn!(attempt, "chart spec did not parse: {}", e);
                    last_error = e.to_string();
                    user_prompt = format!(
                        "{}\n\nAttempt {} was not valid JSON ({}). Return only the JSON object.",
                        base_prompt, attempt, e
                    );
                }
            }
        }

        Err(AssistantError::UnparsableOutput {
            tag: SPEC_TAG.to_string(),
            reason: last_error,
        }
        .into())
    }

    /// Builds a chart for `result`: sample, choose a template, synthesize the spec, inject the data.
    pub async fn get_chart(
        &self,
        context: &AssistantContext,
        result: &QueryResult,
        additional_prompt: &str,
    ) -> Result<Chart> {
        let row_count = result.row_count();
        let sampled = sample(result, context.config.assistant.chart_sample_rows);

        let choice = self
            .choose_visualization(context, &sampled, row_count, additional_prompt)
            .await?;
        info!(visualization = %choice, rows = row_count, "chart type chosen");

        let spec = self
            .create_visualization(context, &choice, &sampled, row_count, additional_prompt)
            .await?;

        Ok(Chart {
            visualization: choice,
            spec: inject_data(spec, result),
        })
    }
}
