//! Interface de terminal do resume-agents: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`RunProgress`] acompanha visualmente uma
//! execução do grafo de categorias.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::evaluation::EvaluationVerdict;
use crate::orchestrator::RunObserver;
use crate::retrieval::SearchOutcome;
use crate::state_machine::{Category, Node, RevisionDecision, RunReport};

/// Indicador visual de progresso para uma execução no terminal.
///
/// Exibe um spinner durante cada categoria e mensagens coloridas para
/// aprovação (verde), revisão (amarelo) e avisos (vermelho).
pub struct RunProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl RunProgress {
    /// Inicia o spinner com o nome da empresa.
    pub fn start(company: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Preparando candidatura para {company}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Imprime o relatório final formatado em JSON com estilo colorido.
    pub fn print_report(&self, report: &RunReport) {
        let style = match report.terminal {
            Node::End if report.warnings().count() == 0 => &self.green,
            Node::End => &self.yellow,
            _ => &self.red,
        };
        println!();
        println!("{}", style.apply_to("─── Run Report ───"));
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
    }
}

impl RunObserver for RunProgress {
    fn run_started(&self, plan: &[Category]) {
        let names: Vec<String> = plan.iter().map(|c| c.to_string()).collect();
        self.pb
            .println(format!("  {} {}", self.dim.apply_to("plano:"), names.join(" → ")));
    }

    fn category_started(&self, category: Category, attempt: u32) {
        if attempt == 0 {
            self.pb.set_message(format!("{category}"));
        } else {
            self.pb.set_message(format!("{category} (revisão {attempt})"));
        }
    }

    fn category_evaluated(
        &self,
        category: Category,
        verdict: &EvaluationVerdict,
        decision: &RevisionDecision,
    ) {
        let score = format!("{:.1}/{:.0}", verdict.overall_score, verdict.threshold);
        match decision {
            RevisionDecision::Advance => {
                self.pb
                    .println(format!("  {} {category} {score}", self.green.apply_to("✓")));
            }
            RevisionDecision::Retry { attempt } => {
                self.pb.println(format!(
                    "  {} {category} {score}, revisão {attempt}",
                    self.yellow.apply_to("↻")
                ));
                for line in verdict.feedback.lines() {
                    self.pb.println(format!("      {}", self.dim.apply_to(line)));
                }
            }
            RevisionDecision::EscalateWithWarning => {
                self.pb.println(format!(
                    "  {} {category} {score}, orçamento de revisões esgotado",
                    self.red.apply_to("!")
                ));
            }
        }
    }

    fn run_finished(&self, report: &RunReport) {
        self.pb.finish_and_clear();
        match report.terminal {
            Node::End => println!(
                "  {} Execução concluída (qualidade {})",
                self.green.apply_to("✓"),
                report
                    .quality_score
                    .map(|q| format!("{q:.1}"))
                    .unwrap_or_else(|| "-".into())
            ),
            Node::Cancelled => println!("  {} Execução cancelada", self.yellow.apply_to("✗")),
            _ => println!("  {} Execução abortada", self.red.apply_to("✗")),
        }
    }
}

/// Imprime os resultados de uma busca de experiências.
pub fn print_search(outcome: &SearchOutcome) {
    let yellow = Style::new().yellow();
    if let Some(reason) = &outcome.degraded {
        println!(
            "  {} modo {} indisponível, usando {}: {reason}",
            yellow.apply_to("!"),
            outcome.requested,
            outcome.used
        );
    }
    if outcome.hits.is_empty() {
        println!("  nenhum resultado");
        return;
    }
    let bold = Style::new().bold();
    for hit in &outcome.hits {
        println!(
            "  {:.3}  {} [{}] {}",
            hit.score,
            bold.apply_to(&hit.record.id),
            hit.record.category,
            hit.record.text
        );
    }
}
