//! Prompt templates guiding clients through the tool surface.

use crate::prompt::{Prompt, PromptBuilder};
use crate::protocol::GetPromptResult;

pub fn build_all() -> Vec<Prompt> {
    vec![plan_outdoor_activity(), marine_trip_briefing()]
}

fn plan_outdoor_activity() -> Prompt {
    PromptBuilder::new("plan_outdoor_activity")
        .description("Find the best weather window for an outdoor activity")
        .required_arg("activity", "Activity: running, cycling, hiking, kids_playground or commuting")
        .required_arg("place", "Place name, e.g. 'Oslo'")
        .optional_arg("when", "Time horizon, e.g. 'next_24h' or 'next_48h'")
        .handler(|args| async move {
            let activity = args.get("activity").cloned().unwrap_or_default();
            let place = args.get("place").cloned().unwrap_or_default();
            let when = args.get("when").cloned().unwrap_or_else(|| "next_48h".to_string());
            Ok(GetPromptResult::user_message(format!(
                "Plan {activity} in {place} within the {when} horizon.\n\n\
                 1. Resolve the place with places.resolve_name (query: \"{place}\"). \
                 If several candidates come back, ask which one is meant.\n\
                 2. Call weather.assess_activity_windows with the resolved \
                 coordinates, activityType \"{activity}\" and the \"{when}\" preset.\n\
                 3. Present the best windows with their temperatures and wind, \
                 and mention the data attribution."
            )))
        })
}

fn marine_trip_briefing() -> Prompt {
    PromptBuilder::new("marine_trip_briefing")
        .description("Assess sea conditions for a small-craft trip")
        .required_arg("route", "Waypoints as 'lat,lon; lat,lon; ...'")
        .required_arg("vessel", "Vessel type: kayak, small_sailboat, motorboat or ship")
        .handler(|args| async move {
            let route = args.get("route").cloned().unwrap_or_default();
            let vessel = args.get("vessel").cloned().unwrap_or_default();
            Ok(GetPromptResult::user_message(format!(
                "Prepare a go/no-go briefing for a {vessel} trip along: {route}.\n\n\
                 1. Call weather.assess_route_risk with the waypoints and \
                 vesselType \"{vessel}\".\n\
                 2. Lead with the verdict, then walk through each hotspot \
                 (where, when, wave height, current).\n\
                 3. Close with the recommendation and the data attribution."
            )))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn both_prompts_are_listed() {
        let prompts = build_all();
        let names: Vec<_> = prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["plan_outdoor_activity", "marine_trip_briefing"]);
    }

    #[tokio::test]
    async fn activity_prompt_mentions_the_tools() {
        let prompts = build_all();
        let prompt = &prompts[0];
        let mut args = HashMap::new();
        args.insert("activity".to_string(), "running".to_string());
        args.insert("place".to_string(), "Oslo".to_string());
        let result = prompt.get(args).await.unwrap();
        match &result.messages[0].content {
            crate::protocol::Content::Text { text } => {
                assert!(text.contains("places.resolve_name"));
                assert!(text.contains("weather.assess_activity_windows"));
                assert!(text.contains("running"));
            }
        }
    }

    #[tokio::test]
    async fn marine_prompt_mentions_route_tool() {
        let prompts = build_all();
        let prompt = &prompts[1];
        let mut args = HashMap::new();
        args.insert("route".to_string(), "59.9,10.7; 59.85,10.75".to_string());
        args.insert("vessel".to_string(), "kayak".to_string());
        let result = prompt.get(args).await.unwrap();
        match &result.messages[0].content {
            crate::protocol::Content::Text { text } => {
                assert!(text.contains("weather.assess_route_risk"));
                assert!(text.contains("kayak"));
            }
        }
    }
}
