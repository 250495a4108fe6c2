//! Analysis prompts
//!
//! Every prompt asks for a single JSON object so the reply can be parsed
//! without scraping prose.

use bizval_common::db::{AnalysisKind, Company, Valuation};
use std::fmt::Write;

/// System + user message pair sent to the analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const SYSTEM_ROLE: &str = "You are an experienced M&A advisor helping owners of small and \
     medium-sized companies prepare for a sale. Answer with one JSON object and nothing else.";

fn describe_company(out: &mut String, company: &Company, valuation: &Valuation) {
    let _ = writeln!(out, "Company: {}", company.name);
    if let Some(business_id) = company.business_id.as_deref() {
        let _ = writeln!(out, "Business ID: {}", business_id);
    }
    if let Some(industry) = company.industry.as_deref() {
        let _ = writeln!(out, "Industry: {}", industry);
    }
    if let Some(description) = company.description.as_deref() {
        let _ = writeln!(out, "Description: {}", description);
    }

    let _ = writeln!(out, "\nLatest financials:");
    let _ = writeln!(out, "- Revenue: {:.0}", valuation.revenue);
    let _ = writeln!(out, "- EBITDA: {:.0}", valuation.ebitda);
    let _ = writeln!(out, "- Net income: {:.0}", valuation.net_income);
    let _ = writeln!(out, "- Book equity: {:.0}", valuation.book_equity);
    let _ = writeln!(out, "- Net debt: {:.0}", valuation.net_debt);
    let _ = writeln!(
        out,
        "- Multiples: revenue {:.2}x, EBITDA {:.2}x, P/E {:.2}x",
        valuation.revenue_multiple, valuation.ebitda_multiple, valuation.pe_multiple
    );
    if let Some(equity_value) = valuation.equity_value {
        let _ = writeln!(out, "- Current equity value estimate: {:.0}", equity_value);
    }
}

/// Prompt for a sales or post due diligence readiness assessment
pub fn readiness_prompt(kind: AnalysisKind, company: &Company, valuation: &Valuation) -> Prompt {
    let focus = match kind {
        AnalysisKind::PostDdReadiness => {
            "Assess how ready the company is to close the sale after buyer due diligence: \
             open findings, contract and ownership risks, and anything that could reduce \
             the price at signing."
        }
        _ => {
            "Assess how ready the company is to be put up for sale: financial transparency, \
             owner dependency, customer concentration, documentation and growth story."
        }
    };

    let mut user = String::new();
    describe_company(&mut user, company, valuation);
    let _ = write!(
        user,
        "\n{}\n\nReply with JSON of the form \
         {{\"score\": <0-100>, \"summary\": \"<two or three sentences>\", \
         \"tasks\": [{{\"title\": \"...\", \"description\": \"...\", \
         \"category\": \"...\", \"priority\": \"low|medium|high\"}}]}}. \
         List at most 8 concrete tasks, most important first.",
        focus
    );

    Prompt {
        system: SYSTEM_ROLE.to_string(),
        user,
    }
}

/// Prompt asking for DCF assumptions when the caller supplied none
pub fn dcf_assumptions_prompt(company: &Company, valuation: &Valuation) -> Prompt {
    let mut user = String::new();
    describe_company(&mut user, company, valuation);
    let _ = write!(
        user,
        "\nPropose conservative discounted cash flow assumptions for this company. \
         Rates are fractions (0.08 means 8 %). Reply with JSON of the form \
         {{\"baseFreeCashFlow\": <number>, \"growthRate\": <number>, \
         \"discountRate\": <number>, \"terminalGrowthRate\": <number>, \
         \"years\": <1-30>, \"netDebt\": {:.0}}}. \
         discountRate must exceed terminalGrowthRate.",
        valuation.net_debt
    );

    Prompt {
        system: SYSTEM_ROLE.to_string(),
        user,
    }
}
