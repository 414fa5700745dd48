use log::{debug, info};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::errors::*;
use crate::overview::*;
use crate::types::*;

pub trait BudgetApi {
    fn fetch_overview(&self, year: i32) -> Result<Overview>;
    fn create_group(&self, title: &str, color: Option<&str>) -> Result<SectionEditable>;
    fn rename_group(&self, id: &SectionId, title: &str) -> Result<()>;
    fn delete_group(&self, id: &SectionId) -> Result<()>;
    fn sync_category_assignments(&self, assignments: &[CategoryAssignment]) -> Result<()>;
}

pub type TokenListener = Box<dyn Fn(&str)>;

pub struct BudgetApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: RefCell<String>,
    refresh_token: Option<String>,
    token_listener: RefCell<Option<TokenListener>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenResponse {
    access_token: String,
}

impl BudgetApiClient {
    pub fn new(
        base_url: &str,
        access_token: String,
        refresh_token: Option<String>,
        token_listener: Option<TokenListener>,
    ) -> BudgetApiClient {
        BudgetApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: RefCell::new(access_token),
            refresh_token,
            token_listener: RefCell::new(token_listener),
        }
    }

    pub fn set_token_listener(&self, listener: TokenListener) {
        *self.token_listener.borrow_mut() = Some(listener);
    }

    pub fn clear_token_listener(&self) {
        *self.token_listener.borrow_mut() = None;
    }

    pub fn access_token(&self) -> String {
        self.access_token.borrow().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn update_access_token(&self, token: String) {
        *self.access_token.borrow_mut() = token.clone();
        if let Some(listener) = self.token_listener.borrow().as_ref() {
            listener(&token);
        }
    }

    // Retries once after refreshing the access token on a 401.
    fn send<F>(&self, description: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let response = self.send_once(description, &build)?;
        if response.status() == StatusCode::UNAUTHORIZED && self.refresh_token.is_some() {
            self.refresh_access_token()?;
            return check_status(self.send_once(description, &build)?);
        }
        check_status(response)
    }

    fn send_once<F>(&self, description: &str, build: &F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        build(&self.http)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token.borrow()))
            .send()
            .chain_err(|| ErrorKind::Network(description.to_string()))
    }

    fn refresh_access_token(&self) -> Result<()> {
        let refresh_token = match &self.refresh_token {
            Some(token) => token,
            None => bail!(ErrorKind::Server(401, "Access token rejected".to_string())),
        };
        let url = self.url("auth/refresh");
        debug!("Refreshing access token at {}", url);
        let response = self
            .http
            .post(url.as_str())
            .json(&RefreshTokenRequest { refresh_token })
            .send()
            .chain_err(|| ErrorKind::Network("refresh access token".to_string()))?;
        let refreshed: RefreshTokenResponse = parse_json(check_status(response)?)?;
        info!("Access token refreshed");
        self.update_access_token(refreshed.access_token);
        Ok(())
    }
}

impl BudgetApi for BudgetApiClient {
    fn fetch_overview(&self, year: i32) -> Result<Overview> {
        let url = self.url(&format!("budget/overview?year={}", year));
        debug!("Budget overview URL: {}", url);
        let response = self.send("load budget overview", |http| http.get(url.as_str()))?;
        parse_json(response)
    }

    fn create_group(&self, title: &str, color: Option<&str>) -> Result<SectionEditable> {
        let url = self.url("budget/groups");
        let body = CreateGroupRequest { title, color };
        let response = self.send("create budget group", |http| http.post(url.as_str()).json(&body))?;
        parse_json(response)
    }

    fn rename_group(&self, id: &SectionId, title: &str) -> Result<()> {
        let url = self.url(&format!("budget/groups/{}", id));
        let body = RenameGroupRequest { title };
        self.send("rename budget group", |http| http.patch(url.as_str()).json(&body))?;
        Ok(())
    }

    fn delete_group(&self, id: &SectionId) -> Result<()> {
        let url = self.url(&format!("budget/groups/{}", id));
        self.send("delete budget group", |http| http.delete(url.as_str()))?;
        Ok(())
    }

    fn sync_category_assignments(&self, assignments: &[CategoryAssignment]) -> Result<()> {
        let url = self.url("budget/category-assignments");
        let body = CategoryAssignmentsRequest { assignments };
        self.send("sync category assignments", |http| http.put(url.as_str()).json(&body))?;
        Ok(())
    }
}

fn check_status(mut response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    bail!(ErrorKind::Server(status.as_u16(), server_error_message(&body)))
}

fn parse_json<T: serde::de::DeserializeOwned>(mut response: reqwest::Response) -> Result<T> {
    let status = response.status().as_u16();
    response
        .json::<T>()
        .chain_err(|| ErrorKind::Server(status, "Malformed response body".to_string()))
}

fn server_error_message(body: &str) -> String {
    serde_json::from_str::<HashMap<String, serde_json::Value>>(body)
        .ok()
        .and_then(|fields| {
            fields
                .get("message")
                .or_else(|| fields.get("error"))
                .map(|value| match value {
                    serde_json::Value::String(message) => message.clone(),
                    other => other.to_string(),
                })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn client() -> BudgetApiClient {
        BudgetApiClient::new("https://budget.example.com/api/", "t0".to_string(), None, None)
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        assert_eq!(
            client().url("/budget/overview?year=2025"),
            "https://budget.example.com/api/budget/overview?year=2025"
        );
    }

    #[test]
    fn test_server_error_message() {
        assert_eq!(
            server_error_message(r#"{"message": "Group is a system default"}"#),
            "Group is a system default"
        );
        assert_eq!(server_error_message(r#"{"error": {"code": 7}}"#), r#"{"code":7}"#);
        assert_eq!(server_error_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn test_token_listener_is_replaced_not_stacked() {
        let client = client();
        let first_calls = Rc::new(Cell::new(0));
        let second_calls = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(String::new()));

        let counter = Rc::clone(&first_calls);
        client.set_token_listener(Box::new(move |_: &str| counter.set(counter.get() + 1)));
        client.update_access_token("t1".to_string());

        let counter = Rc::clone(&second_calls);
        let last_seen = Rc::clone(&seen);
        client.set_token_listener(Box::new(move |token: &str| {
            counter.set(counter.get() + 1);
            *last_seen.borrow_mut() = token.to_string();
        }));
        client.update_access_token("t2".to_string());

        assert_eq!(first_calls.get(), 1);
        assert_eq!(second_calls.get(), 1);
        assert_eq!(*seen.borrow(), "t2");
        assert_eq!(client.access_token(), "t2");

        client.clear_token_listener();
        client.update_access_token("t3".to_string());
        assert_eq!(second_calls.get(), 1);
    }

    #[test]
    fn test_listener_passed_at_construction() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let client = BudgetApiClient::new(
            "https://budget.example.com",
            "t0".to_string(),
            Some("refresh".to_string()),
            Some(Box::new(move |_: &str| counter.set(counter.get() + 1))),
        );
        client.update_access_token("t1".to_string());
        assert_eq!(calls.get(), 1);
    }
}
