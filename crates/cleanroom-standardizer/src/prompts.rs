//! Prompt construction for the three LLM requests.
//!
//! All builders are pure; the responses they ask for are parsed by
//! [`crate::response`].

use crate::types::{ColumnSample, FeedbackEntry, Mapping};

/// Example block shown in both mapping prompts.
const MAPPING_FORMAT_EXAMPLE: &str = "GATORADE 5V5=GATORADE\nPEPSI MAX=PEPSI\nCOCA COLA ZERO=COCA COLA";

/// Build the column clustering request.
///
/// Each column is listed under its `dataset::column` label with up to
/// `prompt_sample_size` quoted samples; the remainder is summarized by count.
pub fn clustering_prompt(columns: &[ColumnSample], prompt_sample_size: usize) -> String {
    let details: Vec<String> = columns
        .iter()
        .map(|sample| {
            let mut shown = sample
                .samples
                .iter()
                .take(prompt_sample_size)
                .map(|v| format!("\"{v}\""))
                .collect::<Vec<_>>()
                .join(", ");
            if sample.samples.len() > prompt_sample_size {
                shown.push_str(&format!(
                    " ... and {} more values",
                    sample.samples.len() - prompt_sample_size
                ));
            }
            format!(
                "Column: '{}' (File: {})\n  Sample values: {}\n  Total values: {}",
                sample.column.qualified_label(),
                sample.column.dataset,
                shown,
                sample.total_values
            )
        })
        .collect();

    format!(
        "You are an expert data analyst specializing in data cleaning and standardization.\n\n\
        Group the following columns into clusters of columns that hold the same kind of \
        information, judging by both their names and their sample values.\n\n\
        COLUMNS:\n{}\n\n\
        RULES:\n\
        1. Group columns that contain the same type of information (for example brand or \
        product names, categories, locations, descriptions).\n\
        2. Refer to every column by its exact label as written between the quotes above, \
        including the part before '::'.\n\
        3. Each column must appear in exactly ONE cluster; a column that matches nothing \
        forms a cluster of its own.\n\
        4. Do not invent columns that are not listed.\n\
        5. Output strictly a valid JSON array of arrays, one inner array of labels per cluster.\n\
        6. Do not include explanations, comments, or any text outside the JSON.\n\n\
        EXAMPLE OUTPUT FORMAT:\n\
        [\n  [\"sales.csv::brand\", \"stock.csv::brand_name\"],\n  [\"sales.csv::region\"]\n]\n\n\
        YOUR CLUSTERING RESULT:",
        details.join("\n")
    )
}

/// Build the initial mapping request for one value set.
pub fn initial_mapping_prompt(values: &[String]) -> String {
    let count = values.len();
    let quoted = values
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "You are an expert in cleaning and deduplicating names in tabular data.\n\n\
        Below is a list of {count} values collected from one column. Values may differ by \
        typos, prefixes or suffixes, version numbers, formatting, or small descriptive additions.\n\n\
        Your task is to:\n\
        1. Identify values that refer to the same entity.\n\
        2. Map each group of such values to one shared canonical value.\n\
        3. Choose the canonical value from the provided values, preferring the most common \
        or recognizable form.\n\n\
        CRITICAL REQUIREMENTS:\n\
        - You MUST return exactly {count} mappings, one for each input value.\n\
        - Every input value must appear exactly once on the left side.\n\
        - A value that matches nothing maps to itself.\n\
        - Do not add extra mappings or skip any input values.\n\
        - Do not invent canonical values that are not in the input list.\n\
        - Use the format: original_value=canonical_value\n\
        - One mapping per line.\n\
        - No JSON, no quotes, no extra text.\n\n\
        Values: {quoted}\n\n\
        Return the output strictly in this format:\n\n\
        {MAPPING_FORMAT_EXAMPLE}\n"
    )
}

/// Build a refinement request from the previous mapping and the reviewer's
/// corrections.
pub fn refinement_prompt(previous: &Mapping, feedback: &[FeedbackEntry]) -> String {
    // A Vec of plain structs with string fields always serializes.
    let feedback_json =
        serde_json::to_string_pretty(feedback).unwrap_or_else(|_| String::from("[]"));

    format!(
        "You previously mapped values to canonical values as follows:\n\
        {}\n\n\
        A human reviewer has suggested the following corrections:\n\
        {}\n\n\
        Your task is to:\n\
        - Apply every correction exactly: each 'original' value must map to its 'corrected' value.\n\
        - You may apply the same change to other values that are lexically similar or follow \
        the same naming pattern.\n\
        - Keep every value mapped to a canonical value taken from the original values.\n\n\
        CRITICAL REQUIREMENTS:\n\
        - You MUST return exactly {} mappings, the same number as before.\n\
        - Every original value must appear exactly once on the left side.\n\
        - Do not add extra mappings or skip any values.\n\
        - Do not invent canonical values that are not in the original list.\n\
        - Use the format: original_value=canonical_value\n\
        - One mapping per line, no extra text or formatting.\n\n\
        Return the output strictly in this format:\n\n\
        {MAPPING_FORMAT_EXAMPLE}",
        previous.to_lines(),
        feedback_json,
        previous.len()
    )
}
