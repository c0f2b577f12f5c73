//! Airtable-backed task store.
//!
//! One record per task in a wide table. Each rubric version is its own
//! long-text column (`Rubric_V1`, `Rubric_V2`, ...); columns for new
//! versions are created on demand through the metadata API before the first
//! write that needs them.
//!
//! Record filters are built with [`Formula`], which escapes every literal.

use super::{check_rubric_append, StoreError, TaskStore};
use crate::alignment::{AlignmentHistory, MisalignedItem};
use crate::config::AirtableConfig;
use crate::rubric::ScoreSheet;
use crate::task::versions::parse_rubric_field_name;
use crate::task::{
    rubric_field_name, EvalModel, ModelEvaluation, ProfessionalSector, RubricVersion,
    RubricVersions, Task, TaskStatus,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tokio::sync::RwLock;

const FIELD_TASK_ID: &str = "TaskID";
const FIELD_TRAINER_EMAIL: &str = "TrainerEmail";
const FIELD_STATUS: &str = "Status";
const FIELD_CURRENT_VERSION: &str = "Current_Rubric_Version";
const FIELD_HISTORY: &str = "Alignment_History";

/// Airtable's page size limit for list requests.
const PAGE_SIZE: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Filter formulas
// ─────────────────────────────────────────────────────────────────────────────

/// A `filterByFormula` expression built from escaped literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula(String);

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

impl Formula {
    /// `{field}='value'`
    pub fn eq(field: &str, value: &str) -> Self {
        Self(format!("{{{}}}={}", field, quote(value)))
    }

    /// `{field}!='value'`
    pub fn not_eq(field: &str, value: &str) -> Self {
        Self(format!("{{{}}}!={}", field, quote(value)))
    }

    /// `AND(a, b, ...)`
    pub fn and(parts: Vec<Formula>) -> Self {
        let inner: Vec<String> = parts.into_iter().map(|f| f.0).collect();
        Self(format!("AND({})", inner.join(", ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    id: String,
    name: String,
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableList {
    #[serde(default)]
    tables: Vec<TableSchema>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Record <-> Task mapping
// ─────────────────────────────────────────────────────────────────────────────

fn eval_field(prefix: &str, model: EvalModel) -> String {
    format!("{}_{}", prefix, model.field_suffix())
}

fn optional_json<T: serde::Serialize>(value: Option<&T>) -> Value {
    value
        .and_then(|v| serde_json::to_string(v).ok())
        .map(Value::String)
        .unwrap_or(Value::Null)
}

/// Fields for a create/update. Rubric columns are only included for
/// versions at or above `first_new_version`.
fn task_to_fields(task: &Task, first_new_version: u32) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(FIELD_TASK_ID.into(), json!(task.task_id));
    fields.insert(FIELD_TRAINER_EMAIL.into(), json!(task.trainer_email));
    fields.insert("Prompt".into(), json!(task.prompt));
    fields.insert("GPTResponse".into(), json!(task.gpt_response));
    fields.insert("GeminiResponse".into(), json!(task.gemini_response));
    fields.insert(
        "ProfessionalSector".into(),
        json!(task.professional_sector.as_str()),
    );
    fields.insert("Licensing".into(), optional_json(Some(&task.licensing)));
    fields.insert(FIELD_STATUS.into(), json!(task.status.as_str()));
    fields.insert(FIELD_CURRENT_VERSION.into(), json!(task.current_rubric_version));

    for snapshot in task.rubrics.iter().filter(|s| s.version >= first_new_version) {
        fields.insert(rubric_field_name(snapshot.version), json!(snapshot.content));
    }

    for model in [EvalModel::Gemini, EvalModel::Gpt] {
        let eval = task.evaluation(model);
        fields.insert(
            eval_field("Human_Eval", model),
            optional_json(eval.human_scores.as_ref()),
        );
        fields.insert(
            eval_field("Model_Eval", model),
            optional_json(eval.model_scores.as_ref()),
        );
        fields.insert(
            eval_field("Alignment", model),
            eval.alignment.map(|a| json!(a)).unwrap_or(Value::Null),
        );
        fields.insert(
            eval_field("Misaligned", model),
            optional_json(Some(&eval.misaligned)),
        );
    }

    fields.insert(FIELD_HISTORY.into(), json!(task.alignment_history.to_json()));
    fields.insert(
        "TaskFolder".into(),
        task.folder.as_ref().map(|f| json!(f)).unwrap_or(Value::Null),
    );
    fields.insert("Attachments".into(), optional_json(Some(&task.attachments)));
    fields.insert("CreatedAt".into(), json!(task.created_at));
    fields.insert("UpdatedAt".into(), json!(task.updated_at));
    fields
}

struct RecordReader<'a> {
    task_id: String,
    fields: &'a Map<String, Value>,
}

impl<'a> RecordReader<'a> {
    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Corrupt {
            task_id: self.task_id.clone(),
            reason: reason.into(),
        }
    }

    fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    fn optional_text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }

    fn json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        match self.optional_text(name) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| self.corrupt(format!("{}: {}", name, e))),
        }
    }

    fn evaluation(&self, model: EvalModel) -> Result<ModelEvaluation, StoreError> {
        Ok(ModelEvaluation {
            human_scores: self.json::<ScoreSheet>(&eval_field("Human_Eval", model))?,
            model_scores: self.json::<ScoreSheet>(&eval_field("Model_Eval", model))?,
            alignment: self
                .fields
                .get(&eval_field("Alignment", model))
                .and_then(|v| v.as_u64())
                .map(|a| a.min(100) as u8),
            misaligned: self
                .json::<Vec<MisalignedItem>>(&eval_field("Misaligned", model))?
                .unwrap_or_default(),
        })
    }

    fn rubrics(&self) -> Result<RubricVersions, StoreError> {
        let snapshots: Vec<RubricVersion> = self
            .fields
            .iter()
            .filter_map(|(name, value)| {
                let version = parse_rubric_field_name(name)?;
                let content = value.as_str().filter(|s| !s.is_empty())?;
                Some(RubricVersion {
                    version,
                    content: content.to_string(),
                    created_at: String::new(),
                })
            })
            .collect();
        RubricVersions::from_snapshots(snapshots).map_err(|e| self.corrupt(e.to_string()))
    }

    fn into_task(self) -> Result<Task, StoreError> {
        let status: TaskStatus = self
            .text(FIELD_STATUS)
            .parse()
            .map_err(|e| self.corrupt(format!("{}", e)))?;
        let professional_sector: ProfessionalSector = self
            .text("ProfessionalSector")
            .parse()
            .map_err(|e: String| self.corrupt(e))?;
        let current_rubric_version = self
            .fields
            .get(FIELD_CURRENT_VERSION)
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as u32;
        let alignment_history = match self.optional_text(FIELD_HISTORY) {
            Some(raw) => AlignmentHistory::from_json(&raw)
                .map_err(|e| self.corrupt(format!("{}: {}", FIELD_HISTORY, e)))?,
            None => AlignmentHistory::new(),
        };

        Ok(Task {
            task_id: self.task_id.clone(),
            trainer_email: self.text(FIELD_TRAINER_EMAIL),
            prompt: self.text("Prompt"),
            gpt_response: self.text("GPTResponse"),
            gemini_response: self.text("GeminiResponse"),
            professional_sector,
            licensing: self.json("Licensing")?.unwrap_or_default(),
            status,
            current_rubric_version,
            rubrics: self.rubrics()?,
            gemini: self.evaluation(EvalModel::Gemini)?,
            gpt: self.evaluation(EvalModel::Gpt)?,
            alignment_history,
            folder: self.optional_text("TaskFolder"),
            attachments: self.json("Attachments")?.unwrap_or_default(),
            created_at: self.text("CreatedAt"),
            updated_at: self.text("UpdatedAt"),
        })
    }
}

fn record_to_task(record: &AirtableRecord) -> Result<Task, StoreError> {
    let task_id = record
        .fields
        .get(FIELD_TASK_ID)
        .and_then(|v| v.as_str())
        .unwrap_or(&record.id)
        .to_string();
    RecordReader {
        task_id,
        fields: &record.fields,
    }
    .into_task()
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

pub struct AirtableTaskStore {
    client: Client,
    api_url: String,
    api_key: String,
    base_id: String,
    table: String,
    /// Field names known to exist in the table schema.
    known_fields: RwLock<HashSet<String>>,
}

impl AirtableTaskStore {
    pub fn new(config: &AirtableConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            base_id: config.base_id.clone(),
            table: config.table.clone(),
            known_fields: RwLock::new(HashSet::new()),
        }
    }

    fn records_url(&self) -> String {
        format!(
            "{}/v0/{}/{}",
            self.api_url,
            self.base_id,
            urlencoding::encode(&self.table)
        )
    }

    fn tables_url(&self) -> String {
        format!("{}/v0/meta/bases/{}/tables", self.api_url, self.base_id)
    }

    async fn check(resp: reqwest::Response, action: &str) -> Result<String, StoreError> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %text, "Airtable {} failed", action);
            return Err(StoreError::Remote(format!("{} failed with status {}", action, status)));
        }
        Ok(text)
    }

    /// Select records matching `formula`, following pagination until
    /// `max_records` are collected (or every match when `None`).
    async fn select(
        &self,
        formula: &Formula,
        max_records: Option<usize>,
    ) -> Result<Vec<AirtableRecord>, StoreError> {
        let limit = max_records.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("filterByFormula", formula.as_str().to_string()),
                ("pageSize", PAGE_SIZE.min(limit).to_string()),
            ];
            if let Some(max) = max_records {
                query.push(("maxRecords", max.to_string()));
            }
            if let Some(o) = &offset {
                query.push(("offset", o.clone()));
            }

            let resp = self
                .client
                .get(self.records_url())
                .bearer_auth(&self.api_key)
                .query(&query)
                .send()
                .await?;
            let text = Self::check(resp, "select").await?;
            let page: RecordList = serde_json::from_str(&text)
                .map_err(|e| StoreError::Remote(format!("Invalid select response: {}", e)))?;

            records.extend(page.records);
            offset = page.offset;
            if offset.is_none() || records.len() >= limit {
                break;
            }
        }

        records.truncate(limit);
        Ok(records)
    }

    async fn find_record(&self, task_id: &str) -> Result<Option<AirtableRecord>, StoreError> {
        let formula = Formula::eq(FIELD_TASK_ID, task_id);
        Ok(self.select(&formula, Some(1)).await?.into_iter().next())
    }

    async fn tasks_matching(&self, formula: Formula) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self
            .select(&formula, None)
            .await?
            .iter()
            .map(record_to_task)
            .collect::<Result<Vec<_>, _>>()?;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// Make sure `name` exists as a long-text field, creating it if needed.
    ///
    /// Safe to call repeatedly; known fields are cached.
    pub async fn ensure_field(&self, name: &str) -> Result<(), StoreError> {
        if self.known_fields.read().await.contains(name) {
            return Ok(());
        }

        let resp = self
            .client
            .get(self.tables_url())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| StoreError::Provisioning {
                field: name.to_string(),
                reason: e.to_string(),
            })?;
        let text = Self::check(resp, "schema lookup").await?;
        let tables: TableList = serde_json::from_str(&text).map_err(|e| {
            StoreError::Provisioning {
                field: name.to_string(),
                reason: format!("Invalid schema response: {}", e),
            }
        })?;

        let table = tables
            .tables
            .into_iter()
            .find(|t| t.name == self.table || t.id == self.table)
            .ok_or_else(|| StoreError::Provisioning {
                field: name.to_string(),
                reason: format!("Table {} not found in base", self.table),
            })?;

        let mut known = self.known_fields.write().await;
        known.extend(table.fields.iter().map(|f| f.name.clone()));
        if known.contains(name) {
            return Ok(());
        }

        tracing::info!(field = %name, table = %table.name, "Creating missing Airtable field");
        let resp = self
            .client
            .post(format!("{}/{}/fields", self.tables_url(), table.id))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "name": name,
                "type": "multilineText",
                "description": "Rubric snapshot (JSON)",
            }))
            .send()
            .await
            .map_err(|e| StoreError::Provisioning {
                field: name.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(field = %name, status = %status, body = %body, "Field creation failed");
            return Err(StoreError::Provisioning {
                field: name.to_string(),
                reason: format!("create field returned {}", status),
            });
        }

        known.insert(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl TaskStore for AirtableTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        if self.find_record(&task.task_id).await?.is_some() {
            return Err(StoreError::AlreadyExists(task.task_id.clone()));
        }
        for snapshot in task.rubrics.iter() {
            self.ensure_field(&rubric_field_name(snapshot.version)).await?;
        }

        let resp = self
            .client
            .post(self.records_url())
            .bearer_auth(&self.api_key)
            .json(&json!({ "records": [{ "fields": task_to_fields(task, 1) }] }))
            .send()
            .await?;
        Self::check(resp, "create").await?;
        tracing::debug!(task_id = %task.task_id, "Created Airtable record");
        Ok(())
    }

    async fn find_task(
        &self,
        task_id: &str,
        trainer_email: &str,
    ) -> Result<Option<Task>, StoreError> {
        let formula = Formula::and(vec![
            Formula::eq(FIELD_TASK_ID, task_id),
            Formula::eq(FIELD_TRAINER_EMAIL, trainer_email),
        ]);
        match self.select(&formula, Some(1)).await?.first() {
            Some(record) => {
                let task = record_to_task(record)?;
                Ok((task.trainer_email == trainer_email).then_some(task))
            }
            None => Ok(None),
        }
    }

    async fn find_incomplete_task(&self, trainer_email: &str) -> Result<Option<Task>, StoreError> {
        let formula = Formula::and(vec![
            Formula::eq(FIELD_TRAINER_EMAIL, trainer_email),
            Formula::not_eq(FIELD_STATUS, TaskStatus::Completed.as_str()),
        ]);
        Ok(self.tasks_matching(formula).await?.into_iter().next())
    }

    async fn list_tasks(&self, trainer_email: &str) -> Result<Vec<Task>, StoreError> {
        self.tasks_matching(Formula::eq(FIELD_TRAINER_EMAIL, trainer_email))
            .await
    }

    async fn prepare_rubric_version(&self, version: u32) -> Result<(), StoreError> {
        self.ensure_field(&rubric_field_name(version)).await
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let record = self
            .find_record(&task.task_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(task.task_id.clone()))?;
        let stored = record_to_task(&record)?;
        check_rubric_append(&task.task_id, &stored.rubrics, &task.rubrics)?;

        let first_new = stored.rubrics.next_version();
        let resp = self
            .client
            .patch(self.records_url())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "records": [{ "id": record.id, "fields": task_to_fields(task, first_new) }]
            }))
            .send()
            .await?;
        Self::check(resp, "update").await?;
        tracing::debug!(task_id = %task.task_id, status = %task.status, "Updated Airtable record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::task::tests::sample_content;
    use axum::{
        extract::{Path, Query, State},
        routing::{get, post},
        Json, Router,
    };
    use regex::Regex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockBase {
        records: Vec<(String, Map<String, Value>)>,
        fields: Vec<String>,
        field_creates: Vec<String>,
        fail_field_creation: bool,
    }

    type Shared = Arc<Mutex<MockBase>>;

    /// Evaluate the `{F}='v'` / `{F}!='v'` conjunctions produced by `Formula`.
    fn matches_formula(formula: &str, fields: &Map<String, Value>) -> bool {
        let re = Regex::new(r"\{(\w+)\}(!?=)'((?:[^'\\]|\\.)*)'").unwrap();
        let matched = re.captures_iter(formula).all(|caps| {
            let actual = fields.get(&caps[1]).and_then(|v| v.as_str()).unwrap_or("");
            let expected = caps[3].replace("\\'", "'").replace("\\\\", "\\");
            (actual == expected) == (&caps[2] == "=")
        });
        matched
    }

    async fn list_tables(State(base): State<Shared>) -> Json<Value> {
        let base = base.lock().await;
        let fields: Vec<Value> = base.fields.iter().map(|f| json!({ "name": f })).collect();
        Json(json!({ "tables": [{ "id": "tblTasks", "name": "Tasks", "fields": fields }] }))
    }

    async fn create_field(
        State(base): State<Shared>,
        Path((_base_id, table_id)): Path<(String, String)>,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        let mut base = base.lock().await;
        if base.fail_field_creation || table_id != "tblTasks" {
            return (
                axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "INVALID_REQUEST" })),
            );
        }
        let name = body["name"].as_str().unwrap_or_default().to_string();
        assert_eq!(body["type"], "multilineText");
        base.fields.push(name.clone());
        base.field_creates.push(name);
        (axum::http::StatusCode::OK, Json(body))
    }

    async fn select_records(
        State(base): State<Shared>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let base = base.lock().await;
        let formula = query.get("filterByFormula").cloned().unwrap_or_default();
        let max: usize = query
            .get("maxRecords")
            .and_then(|m| m.parse().ok())
            .unwrap_or(usize::MAX);
        let records: Vec<Value> = base
            .records
            .iter()
            .filter(|(_, fields)| matches_formula(&formula, fields))
            .take(max)
            .map(|(id, fields)| json!({ "id": id, "fields": fields }))
            .collect();
        Json(json!({ "records": records }))
    }

    fn unknown_field(base: &MockBase, fields: &Map<String, Value>) -> Option<String> {
        fields
            .keys()
            .find(|k| k.starts_with("Rubric_V") && !base.fields.contains(k))
            .cloned()
    }

    async fn create_records(
        State(base): State<Shared>,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        let mut base = base.lock().await;
        let fields = body["records"][0]["fields"].as_object().cloned().unwrap();
        if let Some(field) = unknown_field(&base, &fields) {
            return (
                axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": format!("UNKNOWN_FIELD_NAME {}", field) })),
            );
        }
        let id = format!("rec{}", base.records.len() + 1);
        base.records.push((id.clone(), fields));
        (axum::http::StatusCode::OK, Json(json!({ "records": [{ "id": id }] })))
    }

    async fn update_records(
        State(base): State<Shared>,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        let mut base = base.lock().await;
        let id = body["records"][0]["id"].as_str().unwrap().to_string();
        let fields = body["records"][0]["fields"].as_object().cloned().unwrap();
        if let Some(field) = unknown_field(&base, &fields) {
            return (
                axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": format!("UNKNOWN_FIELD_NAME {}", field) })),
            );
        }
        let record = base.records.iter_mut().find(|(rid, _)| *rid == id).unwrap();
        for (k, v) in fields {
            record.1.insert(k, v);
        }
        (axum::http::StatusCode::OK, Json(json!({ "records": [{ "id": id }] })))
    }

    async fn mock_store() -> (AirtableTaskStore, Shared) {
        let base: Shared = Arc::new(Mutex::new(MockBase::default()));
        let app = Router::new()
            .route("/v0/meta/bases/:base/tables", get(list_tables))
            .route(
                "/v0/meta/bases/:base/tables/:table/fields",
                post(create_field),
            )
            .route(
                "/v0/:base/:table",
                get(select_records).post(create_records).patch(update_records),
            )
            .with_state(Arc::clone(&base));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store = AirtableTaskStore::new(&AirtableConfig {
            api_key: "key".to_string(),
            base_id: "appBase".to_string(),
            table: "Tasks".to_string(),
            api_url: format!("http://{}", addr),
        });
        (store, base)
    }

    #[test]
    fn test_formula_escapes_literals() {
        let formula = Formula::and(vec![
            Formula::eq("TaskID", "x' OR TRUE() OR 'y"),
            Formula::not_eq("Status", "Completed"),
        ]);
        assert_eq!(
            formula.as_str(),
            r"AND({TaskID}='x\' OR TRUE() OR \'y', {Status}!='Completed')"
        );
        assert_eq!(Formula::eq("A", r"back\slash").as_str(), r"{A}='back\\slash'");
    }

    #[test]
    fn test_fields_round_trip() {
        let mut task = Task::new(
            "t1".to_string(),
            "a@example.com".to_string(),
            sample_content(),
        );
        task.rubrics.append(1, "{\"rubric_1\":\"q\"}", "").unwrap();
        task.gemini.alignment = Some(73);
        let record = AirtableRecord {
            id: "rec1".to_string(),
            fields: task_to_fields(&task, 1),
        };
        assert!(record.fields.contains_key("Rubric_V1"));
        assert_eq!(record.fields["Alignment_Gemini"], json!(73));
        assert_eq!(record.fields["Human_Eval_GPT"], Value::Null);
        assert_eq!(record_to_task(&record).unwrap(), task);

        assert!(!task_to_fields(&task, 2).contains_key("Rubric_V1"));
    }

    #[tokio::test]
    async fn test_ensure_field_creates_once() {
        let (store, base) = mock_store().await;
        base.lock().await.fields = vec!["TaskID".to_string(), "Rubric_V1".to_string()];

        store.ensure_field("Rubric_V1").await.unwrap();
        store.ensure_field("Rubric_V2").await.unwrap();
        store.ensure_field("Rubric_V2").await.unwrap();

        assert_eq!(base.lock().await.field_creates, vec!["Rubric_V2".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_field_creation_aborts() {
        let (store, base) = mock_store().await;
        base.lock().await.fail_field_creation = true;
        let err = store.prepare_rubric_version(3).await.unwrap_err();
        assert!(matches!(err, StoreError::Provisioning { ref field, .. } if field == "Rubric_V3"));
    }

    #[tokio::test]
    async fn test_create_find_update_through_api() {
        let (store, base) = mock_store().await;
        let mut task = Task::new(
            "t1".to_string(),
            "o'brien@example.com".to_string(),
            sample_content(),
        );
        store.create_task(&task).await.unwrap();
        assert!(matches!(
            store.create_task(&task).await,
            Err(StoreError::AlreadyExists(_))
        ));

        let found = store
            .find_task("t1", "o'brien@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, TaskStatus::TaskCreation);
        assert!(store.find_task("t1", "other@example.com").await.unwrap().is_none());

        store.prepare_rubric_version(1).await.unwrap();
        task.rubrics.append(1, "{\"rubric_1\":\"Question one here\"}", "").unwrap();
        task.status = TaskStatus::RubricV1;
        store.update_task(&task).await.unwrap();

        let found = store
            .find_incomplete_task("o'brien@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, TaskStatus::RubricV1);
        assert_eq!(found.rubrics.len(), 1);
        assert_eq!(base.lock().await.field_creates, vec!["Rubric_V1".to_string()]);
    }
}
