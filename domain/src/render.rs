//! Renders an insight record into the subject, HTML body and plain-text body of the
//! delivery email.

use crate::error::Error;
use crate::{insight_records, sessions};
use serde::Serialize;
use std::fmt::Write;
use utoipa::ToSchema;

const RULE_WIDTH: usize = 60;
const FOOTER: &str = "Generated by Meeting Synthesis";
const DATE_FORMAT: &str = "%B %d, %Y at %I:%M %p";

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RenderedMessage {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Renders both bodies from the same record.
///
/// Fails when the record lacks content the email cannot be sent without, so a partially
/// rendered message is never produced.
pub fn render(
    session: &sessions::Model,
    insight: &insight_records::Model,
) -> Result<RenderedMessage, Error> {
    if insight.summary.trim().is_empty() {
        return Err(Error::validation("insight record has an empty summary"));
    }
    if let Some(position) = insight
        .action_items
        .iter()
        .position(|item| item.task.trim().is_empty())
    {
        return Err(Error::validation(format!(
            "action item {} has no task",
            position + 1
        )));
    }

    Ok(RenderedMessage {
        subject: format!("Meeting Synthesis: {}", session.title),
        html_body: html_body(session, insight),
        text_body: text_body(session, insight),
    })
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn section_heading(html: &mut String, heading: &str, count: usize) {
    let _ = write!(
        html,
        "<h2 style=\"font-size:16px;color:#1f2937;margin:24px 0 8px\">{heading} ({count})</h2>"
    );
}

fn numbered_list(html: &mut String, items: &[String]) {
    html.push_str("<ol style=\"margin:0;padding-left:20px\">");
    for item in items {
        let _ = write!(html, "<li style=\"margin-bottom:6px\">{}</li>", html_escape(item));
    }
    html.push_str("</ol>");
}

fn html_body(session: &sessions::Model, insight: &insight_records::Model) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head>\
         <body style=\"font-family:Arial,sans-serif;color:#374151;max-width:640px;margin:0 auto\">",
    );
    let _ = write!(
        html,
        "<h1 style=\"font-size:22px;color:#111827;margin-bottom:4px\">{}</h1>\
         <p style=\"color:#6b7280;margin-top:0\">{}</p>",
        html_escape(&session.title),
        html_escape(&session.created_at.format(DATE_FORMAT).to_string())
    );

    html.push_str("<h2 style=\"font-size:16px;color:#1f2937;margin:24px 0 8px\">Summary</h2>");
    let _ = write!(html, "<p>{}</p>", html_escape(&insight.summary));

    if !insight.decisions.is_empty() {
        section_heading(&mut html, "Key Decisions", insight.decisions.len());
        numbered_list(&mut html, &insight.decisions.0);
    }

    if !insight.action_items.is_empty() {
        section_heading(&mut html, "Action Items", insight.action_items.len());
        html.push_str("<ol style=\"margin:0;padding-left:20px\">");
        for item in insight.action_items.iter() {
            let _ = write!(html, "<li style=\"margin-bottom:8px\">{}", html_escape(&item.task));
            if let Some(owner) = &item.owner {
                let _ = write!(
                    html,
                    "<br><span style=\"color:#6b7280\">Owner: {}</span>",
                    html_escape(owner)
                );
            }
            if let Some(due_date) = &item.due_date {
                let _ = write!(
                    html,
                    "<br><span style=\"color:#6b7280\">Due: {}</span>",
                    html_escape(due_date)
                );
            }
            html.push_str("</li>");
        }
        html.push_str("</ol>");
    }

    if !insight.open_questions.is_empty() {
        section_heading(&mut html, "Open Questions", insight.open_questions.len());
        numbered_list(&mut html, &insight.open_questions.0);
    }

    if !insight.topics.is_empty() {
        html.push_str(
            "<h2 style=\"font-size:16px;color:#1f2937;margin:24px 0 8px\">Key Topics</h2><p>",
        );
        for topic in insight.topics.iter() {
            let _ = write!(
                html,
                "<span style=\"display:inline-block;background:#eef2ff;color:#3730a3;\
                 border-radius:12px;padding:2px 10px;margin:0 6px 6px 0\">{}</span>",
                html_escape(topic)
            );
        }
        html.push_str("</p>");
    }

    let _ = write!(
        html,
        "<hr style=\"border:none;border-top:1px solid #e5e7eb;margin-top:32px\">\
         <p style=\"color:#9ca3af;font-size:12px\">{FOOTER}</p></body></html>"
    );
    html
}

fn text_section(lines: &mut Vec<String>, heading: String) {
    lines.push(String::new());
    lines.push(heading);
    lines.push("-".repeat(RULE_WIDTH));
}

fn text_body(session: &sessions::Model, insight: &insight_records::Model) -> String {
    let mut lines = vec![
        format!("MEETING SYNTHESIS: {}", session.title),
        "=".repeat(RULE_WIDTH),
        String::new(),
        "SUMMARY".to_string(),
        "-".repeat(RULE_WIDTH),
        insight.summary.clone(),
        String::new(),
    ];

    if !insight.decisions.is_empty() {
        text_section(
            &mut lines,
            format!("KEY DECISIONS ({})", insight.decisions.len()),
        );
        for (i, decision) in insight.decisions.iter().enumerate() {
            lines.push(format!("{}. {decision}", i + 1));
        }
    }

    if !insight.action_items.is_empty() {
        text_section(
            &mut lines,
            format!("ACTION ITEMS ({})", insight.action_items.len()),
        );
        for (i, item) in insight.action_items.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, item.task));
            if let Some(owner) = &item.owner {
                lines.push(format!("   Owner: {owner}"));
            }
            if let Some(due_date) = &item.due_date {
                lines.push(format!("   Due: {due_date}"));
            }
        }
    }

    if !insight.open_questions.is_empty() {
        text_section(
            &mut lines,
            format!("OPEN QUESTIONS ({})", insight.open_questions.len()),
        );
        for (i, question) in insight.open_questions.iter().enumerate() {
            lines.push(format!("{}. {question}", i + 1));
        }
    }

    if !insight.topics.is_empty() {
        text_section(&mut lines, "KEY TOPICS".to_string());
        lines.push(insight.topics.0.join(", "));
    }

    lines.push(String::new());
    lines.push("=".repeat(RULE_WIDTH));
    lines.push(FOOTER.to_string());
    lines.join("\n")
}
