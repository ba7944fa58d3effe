//! Configuração carregada a partir de `resume-agents.toml`.
//!
//! A struct [`RunConfig`] contém todos os parâmetros configuráveis de uma
//! execução. Valores ausentes no arquivo usam defaults que reproduzem os
//! avaliadores originais. A variável de ambiente `ANTHROPIC_API_KEY` tem
//! precedência sobre o arquivo.
//!
//! Pesos e limiares são validados no carregamento: um erro aqui é fatal e
//! nunca aparece durante a execução.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::evaluation::CategoryCriteria;
use crate::llm::RetryConfig;
use crate::retrieval::SearchMode;
use crate::state_machine::{Category, CriteriaGroup, Route};

pub const CONFIG_FILE: &str = "resume-agents.toml";

/// Profundidade da análise: define o orçamento de revisões e os modelos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    Low,
    #[default]
    Medium,
    High,
}

impl AnalysisDepth {
    /// Revisões adicionais permitidas após a primeira passagem.
    pub fn revision_budget(self) -> u32 {
        match self {
            AnalysisDepth::Low => 1,
            AnalysisDepth::Medium => 2,
            AnalysisDepth::High => 3,
        }
    }

    pub fn tier_for(self, category: Category) -> ModelTier {
        match (self, category) {
            (AnalysisDepth::Low, _) => ModelTier::Quick,
            (AnalysisDepth::Medium, Category::Analysis) => ModelTier::Quick,
            (AnalysisDepth::Medium, _) | (AnalysisDepth::High, _) => ModelTier::Deep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Quick,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    Resume,
    CoverLetter,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum OutputOption {
    GuideOnly,
    #[default]
    Both,
}

/// Parâmetros da busca de experiências.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_mode")]
    pub mode: SearchMode,
    /// Peso semântico na busca híbrida.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Gera embeddings ao salvar um perfil.
    #[serde(default = "default_true")]
    pub advanced: bool,
}

fn default_mode() -> SearchMode {
    SearchMode::Hybrid
}

fn default_alpha() -> f64 {
    0.5
}

fn default_top_k() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            alpha: default_alpha(),
            top_k: default_top_k(),
            advanced: default_true(),
        }
    }
}

/// Critérios por grupo. Os três grupos de produção compartilham `production`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaConfig {
    #[serde(default = "default_analysis")]
    pub analysis: CategoryCriteria,
    #[serde(default = "default_matching")]
    pub matching: CategoryCriteria,
    #[serde(default = "default_strategy")]
    pub strategy: CategoryCriteria,
    #[serde(default = "default_guide")]
    pub guide: CategoryCriteria,
    #[serde(default = "default_production")]
    pub production: CategoryCriteria,
}

fn default_analysis() -> CategoryCriteria {
    CategoryCriteria::new(
        72.0,
        &[
            ("information_accuracy", 0.25),
            ("coverage_completeness", 0.25),
            ("strategic_relevance", 0.25),
            ("insight_depth", 0.25),
        ],
    )
}

fn default_matching() -> CategoryCriteria {
    CategoryCriteria::new(
        80.0,
        &[
            ("candidate_company_fit", 0.30),
            ("market_positioning", 0.25),
            ("competitive_analysis", 0.25),
            ("cultural_integration", 0.20),
        ],
    )
}

fn default_strategy() -> CategoryCriteria {
    CategoryCriteria::new(
        80.0,
        &[
            ("evidence_quality", 0.30),
            ("strategic_positioning", 0.25),
            ("balanced_assessment", 0.25),
            ("differentiation_factor", 0.20),
        ],
    )
}

fn default_guide() -> CategoryCriteria {
    CategoryCriteria::new(
        80.0,
        &[
            ("guidance_specificity", 0.30),
            ("experience_relevance", 0.25),
            ("strategic_coherence", 0.25),
            ("practical_usability", 0.20),
        ],
    )
}

fn default_production() -> CategoryCriteria {
    CategoryCriteria::new(
        84.0,
        &[
            ("content_integration", 0.25),
            ("persuasive_impact", 0.25),
            ("professional_quality", 0.20),
            ("requirements_compliance", 0.15),
            ("differentiation_clarity", 0.15),
        ],
    )
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            analysis: default_analysis(),
            matching: default_matching(),
            strategy: default_strategy(),
            guide: default_guide(),
            production: default_production(),
        }
    }
}

impl CriteriaConfig {
    pub fn for_group(&self, group: CriteriaGroup) -> &CategoryCriteria {
        match group {
            CriteriaGroup::Analysis => &self.analysis,
            CriteriaGroup::Matching => &self.matching,
            CriteriaGroup::Strategy => &self.strategy,
            CriteriaGroup::Guide => &self.guide,
            CriteriaGroup::Production => &self.production,
        }
    }

    pub fn for_category(&self, category: Category) -> &CategoryCriteria {
        self.for_group(category.criteria_group())
    }
}

/// Configuração de nível superior carregada de `resume-agents.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Chave da API Anthropic.
    #[serde(default, skip_serializing)]
    pub api_key: String,

    #[serde(default)]
    pub analysis_depth: AnalysisDepth,

    #[serde(default)]
    pub document_type: DocumentType,

    #[serde(default)]
    pub output_option: OutputOption,

    #[serde(default = "default_quick_model")]
    pub quick_model: String,

    #[serde(default = "default_deep_model")]
    pub deep_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Tempo máximo de cada chamada ao LLM, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub criteria: CriteriaConfig,

    /// Diretório dos perfis salvos.
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,
}

fn default_quick_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}

fn default_deep_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from("profiles")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            analysis_depth: AnalysisDepth::default(),
            document_type: DocumentType::default(),
            output_option: OutputOption::default(),
            quick_model: default_quick_model(),
            deep_model: default_deep_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
            retrieval: RetrievalConfig::default(),
            criteria: CriteriaConfig::default(),
            profiles_dir: default_profiles_dir(),
        }
    }
}

impl RunConfig {
    /// Carrega `resume-agents.toml` do diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml_str(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a chave API.
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<RunConfig>(contents)?)
    }

    /// Rejeita pesos, limiares ou parâmetros de busca inválidos.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for group in [
            CriteriaGroup::Analysis,
            CriteriaGroup::Matching,
            CriteriaGroup::Strategy,
            CriteriaGroup::Guide,
            CriteriaGroup::Production,
        ] {
            self.criteria.for_group(group).validate(group)?;
        }
        if !(0.0..=1.0).contains(&self.retrieval.alpha) {
            return Err(ConfigError::InvalidAlpha(self.retrieval.alpha));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        Ok(())
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Quick => &self.quick_model,
            ModelTier::Deep => &self.deep_model,
        }
    }

    pub fn model_for_category(&self, category: Category) -> &str {
        self.model_for(self.analysis_depth.tier_for(category))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn route(&self) -> Route {
        Route::new(self.document_type, self.output_option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = RunConfig::default();
        assert_eq!(config.analysis_depth, AnalysisDepth::Medium);
        assert_eq!(config.document_type, DocumentType::Resume);
        assert_eq!(config.output_option, OutputOption::Both);
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retrieval.mode, SearchMode::Hybrid);
        assert_eq!(config.retrieval.alpha, 0.5);
        assert!(config.api_key.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_thresholds() {
        let c = CriteriaConfig::default();
        assert_eq!(c.for_category(Category::Analysis).threshold, 72.0);
        assert_eq!(c.for_category(Category::Matching).threshold, 80.0);
        assert_eq!(c.for_category(Category::Strategy).threshold, 80.0);
        assert_eq!(c.for_category(Category::Guide).threshold, 80.0);
        assert_eq!(c.for_category(Category::ResumeWriting).threshold, 84.0);
        assert_eq!(c.for_category(Category::QualityCheck).threshold, 84.0);
        assert_eq!(c.production.criteria.len(), 5);
    }

    #[test]
    fn deserialize_partial_toml() {
        let config = RunConfig::from_toml_str(
            r#"
            analysis_depth = "high"
            document_type = "cover_letter"

            [retrieval]
            mode = "keyword"
            alpha = 0.3

            [criteria.analysis]
            threshold = 60.0
            criteria = [
                { name = "information_accuracy", weight = 0.5 },
                { name = "insight_depth", weight = 0.5, depends_on = ["company_analyst"] },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis_depth, AnalysisDepth::High);
        assert_eq!(config.document_type, DocumentType::CoverLetter);
        assert_eq!(config.retrieval.mode, SearchMode::Keyword);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.criteria.analysis.threshold, 60.0);
        assert_eq!(config.criteria.analysis.criteria[1].depends_on.len(), 1);
        assert_eq!(config.criteria.matching.threshold, 80.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_weights_fail_validation() {
        let config = RunConfig::from_toml_str(
            r#"
            [criteria.guide]
            threshold = 80.0
            criteria = [{ name = "guidance_specificity", weight = 0.6 }]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeightSum { .. })
        ));
    }

    #[test]
    fn bad_retrieval_settings_fail_validation() {
        let mut config = RunConfig::default();
        config.retrieval.alpha = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidAlpha(_))));

        let mut config = RunConfig::default();
        config.retrieval.top_k = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK)));
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.max_tokens, 4000);
    }

    #[test]
    fn load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[retrieval]\ntop_k = 0\n").unwrap();
        assert!(matches!(
            RunConfig::load_from(&path),
            Err(ConfigError::InvalidTopK)
        ));
    }

    #[test]
    fn model_tiering_by_depth() {
        assert_eq!(AnalysisDepth::Low.tier_for(Category::Guide), ModelTier::Quick);
        assert_eq!(AnalysisDepth::Medium.tier_for(Category::Analysis), ModelTier::Quick);
        assert_eq!(AnalysisDepth::Medium.tier_for(Category::Strategy), ModelTier::Deep);
        assert_eq!(AnalysisDepth::High.tier_for(Category::Analysis), ModelTier::Deep);

        let config = RunConfig::default();
        assert_eq!(
            config.model_for_category(Category::Analysis),
            "claude-haiku-4-5-20251001"
        );
        assert_eq!(
            config.model_for_category(Category::Matching),
            "claude-sonnet-4-5-20250929"
        );
    }
}
