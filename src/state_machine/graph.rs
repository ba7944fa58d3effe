use std::fmt;

use serde::{Deserialize, Serialize};

use super::category::Category;
use crate::config::{DocumentType, OutputOption};

/// A node of the orchestration graph.
///
/// Category nodes are visited in order; the three terminal nodes end the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Category(Category),
    /// Every planned category finished.
    End,
    /// Required input was missing; no category ran.
    Aborted,
    /// The run was cancelled at a category boundary.
    Cancelled,
}

impl Node {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Node::Category(_))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Category(c) => write!(f, "{c}"),
            Node::End => write!(f, "END"),
            Node::Aborted => write!(f, "ABORTED"),
            Node::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Edges of the graph, fixed at run start by the two branch inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    document_type: DocumentType,
    output_option: OutputOption,
}

impl Route {
    pub fn new(document_type: DocumentType, output_option: OutputOption) -> Self {
        Self {
            document_type,
            output_option,
        }
    }

    pub fn start(&self) -> Node {
        Node::Category(Category::Analysis)
    }

    /// Node reached when `from` advances.
    ///
    /// - Analysis → Matching → Strategy → Guide
    /// - Guide → End when only guides are requested, otherwise the first
    ///   production category for the document type
    /// - ResumeWriting → CoverLetterWriting → QualityCheck → End
    pub fn next(&self, from: Category) -> Node {
        match from {
            Category::Analysis => Node::Category(Category::Matching),
            Category::Matching => Node::Category(Category::Strategy),
            Category::Strategy => Node::Category(Category::Guide),
            Category::Guide => match (self.output_option, self.document_type) {
                (OutputOption::GuideOnly, _) => Node::End,
                (OutputOption::Both, DocumentType::CoverLetter) => {
                    Node::Category(Category::CoverLetterWriting)
                }
                (OutputOption::Both, DocumentType::Resume | DocumentType::Both) => {
                    Node::Category(Category::ResumeWriting)
                }
            },
            Category::ResumeWriting => Node::Category(Category::CoverLetterWriting),
            Category::CoverLetterWriting => Node::Category(Category::QualityCheck),
            Category::QualityCheck => Node::End,
        }
    }

    /// Every category this route visits, in order.
    pub fn plan(&self) -> Vec<Category> {
        let mut plan = Vec::new();
        let mut node = self.start();
        while let Node::Category(c) = node {
            plan.push(c);
            node = self.next(c);
        }
        plan
    }

    pub fn includes(&self, category: Category) -> bool {
        self.plan().contains(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_only_ends_after_guide() {
        for doc in [DocumentType::Resume, DocumentType::CoverLetter, DocumentType::Both] {
            let route = Route::new(doc, OutputOption::GuideOnly);
            assert_eq!(
                route.plan(),
                vec![
                    Category::Analysis,
                    Category::Matching,
                    Category::Strategy,
                    Category::Guide
                ]
            );
            assert_eq!(route.next(Category::Guide), Node::End);
        }
    }

    #[test]
    fn resume_branch_runs_every_production_category() {
        let route = Route::new(DocumentType::Resume, OutputOption::Both);
        assert_eq!(
            route.plan()[4..],
            [
                Category::ResumeWriting,
                Category::CoverLetterWriting,
                Category::QualityCheck
            ]
        );
        assert!(route.includes(Category::ResumeWriting));
    }

    #[test]
    fn cover_letter_branch_skips_resume_writing() {
        let route = Route::new(DocumentType::CoverLetter, OutputOption::Both);
        assert_eq!(
            route.next(Category::Guide),
            Node::Category(Category::CoverLetterWriting)
        );
        assert!(!route.includes(Category::ResumeWriting));
        assert_eq!(route.plan().last(), Some(&Category::QualityCheck));
    }

    #[test]
    fn plan_is_acyclic() {
        let route = Route::new(DocumentType::Both, OutputOption::Both);
        let plan = route.plan();
        let mut sorted = plan.clone();
        sorted.dedup();
        assert_eq!(plan.len(), sorted.len());
        assert_eq!(plan.len(), 7);
    }

    #[test]
    fn node_display() {
        assert_eq!(Node::Category(Category::Guide).to_string(), "GUIDE");
        assert_eq!(Node::End.to_string(), "END");
        assert_eq!(Node::Aborted.to_string(), "ABORTED");
        assert!(Node::Cancelled.is_terminal());
        assert!(!Node::Category(Category::Analysis).is_terminal());
    }
}
