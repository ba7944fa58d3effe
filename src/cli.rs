//! Interface de linha de comando do resume-agents baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, profile,
//! search, status) e flags globais que sobrescrevem o `resume-agents.toml`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{AnalysisDepth, DocumentType, OutputOption, RunConfig};
use crate::retrieval::SearchMode;

/// resume-agents: análise de vagas e redação de candidaturas por categorias avaliadas.
#[derive(Debug, Parser)]
#[command(name = "resume-agents", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Profundidade de análise (define o orçamento de revisões).
    #[arg(long, global = true)]
    pub depth: Option<AnalysisDepth>,

    /// Documento a produzir.
    #[arg(long, global = true)]
    pub document_type: Option<DocumentType>,

    /// Apenas guias, ou guias e documentos.
    #[arg(long, global = true)]
    pub output_option: Option<OutputOption>,

    /// Modo de busca de experiências.
    #[arg(long, global = true)]
    pub mode: Option<SearchMode>,

    /// Peso semântico da busca híbrida, entre 0 e 1.
    #[arg(long, global = true)]
    pub alpha: Option<f64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Aplica as flags informadas sobre a configuração carregada.
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(depth) = self.depth {
            config.analysis_depth = depth;
        }
        if let Some(document_type) = self.document_type {
            config.document_type = document_type;
        }
        if let Some(output_option) = self.output_option {
            config.output_option = output_option;
        }
        if let Some(mode) = self.mode {
            config.retrieval.mode = mode;
        }
        if let Some(alpha) = self.alpha {
            config.retrieval.alpha = alpha;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa o grafo de categorias para uma vaga.
    Run {
        /// Arquivo JSON com empresa, vaga, candidato e perguntas.
        #[arg(long)]
        input: PathBuf,

        /// Perfil salvo usado como fonte de experiências.
        #[arg(long)]
        profile: Option<String>,

        /// Diretório onde gravar resultados em JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Gerencia perfis de experiência.
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },

    /// Busca experiências de um perfil salvo.
    Search {
        /// Nome do perfil.
        profile: String,

        /// Texto da consulta.
        query: String,

        /// Número máximo de resultados.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Mostra a configuração efetiva.
    Status,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Normaliza, indexa e salva um perfil a partir de um arquivo JSON.
    Save {
        /// Nome do perfil.
        name: String,

        /// Arquivo JSON com o perfil bruto.
        file: PathBuf,
    },

    /// Lista os perfis salvos.
    List,
}
