use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CATEGORICAL_COLUMNS: [&str; 6] = [
    "AccountWeeks",
    "ContractRenewal",
    "DataPlan",
    "CustServCalls",
    "DayCalls",
    "MaritalStatus",
];

pub const DEFAULT_NUMERIC_COLUMNS: [&str; 4] =
    ["DataUsage", "RoamMins", "MonthlyCharge", "OverageFee"];

/// 流程啟動時載入一次的設定，以參考傳入推論與寫入客戶端
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub endpoint_id: String,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub title: String,
    /// 背景漸層色；舊版 config.json 放在最上層的 `colors`
    pub colors: Vec<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: "Customer Churn Prediction".to_string(),
            colors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
    pub positive_class: String,
    pub access_token: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: 60,
            positive_class: "1".to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub categorical_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            categorical_columns: DEFAULT_CATEGORICAL_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            numeric_columns: DEFAULT_NUMERIC_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Bigquery,
    Csv,
}

impl std::str::FromStr for SinkKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bigquery" => Ok(SinkKind::Bigquery),
            "csv" => Ok(SinkKind::Csv),
            other => Err(EtlError::InvalidConfigValueError {
                field: "sink.kind".to_string(),
                value: other.to_string(),
                reason: "Valid sinks: bigquery, csv".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub dataset: String,
    pub table: String,
    pub base_url: Option<String>,
    pub location: Option<String>,
    pub timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub job_timeout_seconds: u64,
    pub label_column: String,
    pub timestamp_column: String,
    pub output_path: String,
    pub filename: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Bigquery,
            dataset: "churn_dataset".to_string(),
            table: "predictions_table".to_string(),
            base_url: None,
            location: None,
            timeout_seconds: 60,
            poll_interval_ms: 1000,
            job_timeout_seconds: 300,
            label_column: "prediction".to_string(),
            timestamp_column: "prediction_time".to_string(),
            output_path: "./output".to_string(),
            filename: "predictions.csv".to_string(),
        }
    }
}

impl ChurnConfig {
    /// 載入設定檔；`.json` 以 JSON 解析，其餘視為 TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        let is_json = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let json_error = |e: serde_json::Error| EtlError::ConfigValidationError {
            field: "json_parsing".to_string(),
            message: format!("JSON parsing error: {}", e),
        };

        let mut value: serde_json::Value = serde_json::from_str(&processed_content).map_err(json_error)?;
        if let Some(root) = value.as_object_mut() {
            if let Some(colors) = root.remove("colors") {
                let display = root
                    .entry("display")
                    .or_insert_with(|| serde_json::Value::Object(Default::default()));
                if let Some(display) = display.as_object_mut() {
                    display.entry("colors").or_insert(colors);
                }
            }
        }

        serde_json::from_value(value).map_err(json_error)
    }

    /// 替換環境變數 (例如 ${GOOGLE_OAUTH_ACCESS_TOKEN})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn inference_base_url(&self) -> String {
        match &self.inference.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.region),
        }
    }

    pub fn predict_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/endpoints/{}:predict",
            self.inference_base_url(),
            self.project_id,
            self.region,
            self.endpoint_id
        )
    }

    pub fn bigquery_base_url(&self) -> String {
        self.sink
            .base_url
            .as_deref()
            .unwrap_or("https://bigquery.googleapis.com")
            .trim_end_matches('/')
            .to_string()
    }

    /// `project.dataset.table`
    pub fn table_id(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.sink.dataset, self.sink.table)
    }

    /// 未解析的 `${...}` 或空字串視為未提供
    pub fn access_token(&self) -> Option<&str> {
        self.inference
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.starts_with("${"))
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_required("project_id", &self.project_id)?;
        validation::validate_required("region", &self.region)?;
        validation::validate_required("endpoint_id", &self.endpoint_id)?;

        validation::validate_project_id("project_id", &self.project_id)?;
        validation::validate_region("region", &self.region)?;
        validation::validate_resource_id("endpoint_id", &self.endpoint_id)?;

        if let Some(url) = &self.inference.base_url {
            validation::validate_url("inference.base_url", url)?;
        }
        validation::validate_range("inference.timeout_seconds", self.inference.timeout_seconds, 1, 3600)?;
        validation::validate_non_empty_string("inference.positive_class", &self.inference.positive_class)?;

        validation::validate_column_names("schema.categorical_columns", &self.schema.categorical_columns)?;
        validation::validate_column_names("schema.numeric_columns", &self.schema.numeric_columns)?;
        if let Some(both) = self
            .schema
            .numeric_columns
            .iter()
            .find(|c| self.schema.categorical_columns.contains(c))
        {
            return Err(EtlError::InvalidConfigValueError {
                field: "schema".to_string(),
                value: both.clone(),
                reason: "Column is declared both categorical and numeric".to_string(),
            });
        }

        validation::validate_non_empty_string("sink.label_column", &self.sink.label_column)?;
        validation::validate_non_empty_string("sink.timestamp_column", &self.sink.timestamp_column)?;
        if self.sink.label_column == self.sink.timestamp_column {
            return Err(EtlError::ConfigValidationError {
                field: "sink.timestamp_column".to_string(),
                message: "label and timestamp columns must differ".to_string(),
            });
        }

        match self.sink.kind {
            SinkKind::Bigquery => {
                validation::validate_resource_id("sink.dataset", &self.sink.dataset)?;
                validation::validate_resource_id("sink.table", &self.sink.table)?;
                if let Some(url) = &self.sink.base_url {
                    validation::validate_url("sink.base_url", url)?;
                }
                validation::validate_range("sink.timeout_seconds", self.sink.timeout_seconds, 1, 3600)?;
                validation::validate_range("sink.poll_interval_ms", self.sink.poll_interval_ms, 10, 60_000)?;
                validation::validate_range(
                    "sink.job_timeout_seconds",
                    self.sink.job_timeout_seconds,
                    1,
                    24 * 3600,
                )?;
            }
            SinkKind::Csv => {
                validation::validate_non_empty_string("sink.output_path", &self.sink.output_path)?;
                validation::validate_non_empty_string("sink.filename", &self.sink.filename)?;
            }
        }

        Ok(())
    }
}

impl Validate for ChurnConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
