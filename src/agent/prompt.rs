//! User-message templates for agent sessions.

use chrono::NaiveDate;

/// Research request naming the search tools and today's date.
pub fn build_research_prompt(task: &str, today: NaiveDate) -> String {
    format!(
        r#"You are a research function with access to:
- arxiv_search: academic papers
- tavily_search: general web search (return JSON when asked)
- wikipedia_search: encyclopedic summaries

Task:
{task}

Today is {today}."#,
        task = task.trim(),
        today = today.format("%Y-%m-%d"),
    )
}

/// Wrap a request in the personal-assistant preamble.
pub fn build_assistant_prompt(request: &str, user_email: &str) -> String {
    format!(
        r#"- You are an AI assistant specialized in managing the user's day-to-day tasks.
- Use the provided tools to interact with the user's environment.
- Never ask the user for confirmation before performing an action.
- If needed, my email address is "{user_email}" so you can use it for actions related to my account.

{request}"#,
        user_email = user_email,
        request = request.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn research_prompt_carries_date_and_task() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let prompt = build_research_prompt("  Find 2 papers on black holes\n", today);
        assert!(prompt.contains("Task:\nFind 2 papers on black holes\n"));
        assert!(prompt.ends_with("Today is 2025-03-14."));
        assert!(prompt.contains("arxiv_search"));
    }

    #[test]
    fn assistant_prompt_ends_with_request() {
        let prompt = build_assistant_prompt("Remind me to call Daniel\n", "you@email.com");
        assert!(prompt.contains("\"you@email.com\""));
        assert!(prompt.ends_with("\n\nRemind me to call Daniel"));
    }
}
