//! # Event Converter
//!
//! Maps one upstream chunk to zero or more output chunks.
//!
//! Rules, evaluated in order:
//! 1. no choices: nothing
//! 2. delta content: one content chunk, nothing else
//! 3. finish reason with metadata: one source per citation, one
//!    `citation_data` bundle, then the finish chunk
//! 4. chart metadata: one source per chart, then one `chart_data` bundle
//! 5. otherwise, an upstream error object becomes an error chunk

use crate::{
    schemas::UpstreamChunk,
    streaming::core::{FinishMetadata, OutputChunk, SourceDescriptor, StructuredData, TokenUsage},
};
use serde_json::Value;

/// Fields a citation may carry its identifier under, in preference order.
const CITATION_ID_FIELDS: [&str; 4] = ["citationId", "citation_id", "citationNumber", "id"];

const UNKNOWN_ERROR: &str = "Unknown error";

/// Convert one parsed upstream chunk into output chunks, in emission order.
///
/// Fields of an unexpected type are treated as absent.
pub fn convert_event(chunk: &UpstreamChunk) -> Vec<OutputChunk> {
    let Some(choice) = chunk.first_choice() else {
        return Vec::new();
    };

    if let Some(content) = choice.content() {
        return vec![OutputChunk::Content(content.to_string())];
    }

    let mut out = Vec::new();
    let trace_id = chunk.trace_id();

    if let Some(reason) = choice.finish_reason().filter(|_| chunk.has_metadata()) {
        if let Some(citations) = chunk.cited_sources() {
            out.extend(
                citations
                    .iter()
                    .enumerate()
                    .map(|(index, citation)| OutputChunk::Source(url_source(index, citation))),
            );
            out.push(OutputChunk::Data(vec![StructuredData::CitationData {
                trace_id: trace_id.clone(),
                citations: citations.clone(),
            }]));
        }
        out.push(OutputChunk::Finish(FinishMetadata {
            finish_reason: reason.to_string(),
            trace_id: trace_id.clone(),
            usage: TokenUsage::default(),
        }));
    }

    if let Some(charts) = chunk.charts() {
        out.extend(charts.iter().map(|chart| OutputChunk::Source(chart_source(chart))));
        out.push(OutputChunk::Data(vec![StructuredData::ChartData {
            trace_id,
            charts: charts.clone(),
        }]));
    } else if let Some(message) = chunk.error_message() {
        out.push(OutputChunk::Error(message.unwrap_or(UNKNOWN_ERROR).to_string()));
    }

    out
}

fn url_source(index: usize, citation: &Value) -> SourceDescriptor {
    let id = CITATION_ID_FIELDS
        .iter()
        .filter_map(|field| citation.get(*field))
        .find_map(value_to_id)
        .unwrap_or_else(|| format!("citation-{}", index + 1));

    SourceDescriptor::Url {
        id,
        url: string_field(citation, "url"),
        title: string_field(citation, "title"),
        domain: string_field(citation, "domain"),
    }
}

fn chart_source(chart: &Value) -> SourceDescriptor {
    let field = |name: &str| chart.get(name).cloned().unwrap_or(Value::Null);
    SourceDescriptor::Chart {
        id: field("id"),
        metric: field("metric"),
        dataset: field("dataset"),
        entities: field("entities"),
        start: field("start"),
        end: field("end"),
    }
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}
