//! Scripted sender for exercising the engine without a network
//!
//! Replies are handed out in order. Like a real transport, each reply is
//! stamped with the method and URL of the request that consumed it.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use url::Url;

use crate::http::{Request, Response, Sender, TransportError};

enum Reply {
    Response(Response),
    Failure(String),
}

/// A [`Sender`] that replays a fixed script of responses and failures
#[derive(Default)]
pub struct ScriptedSender {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response; its request method and URL are overwritten on use
    pub fn reply(self, response: Response) -> Self {
        lock(&self.replies).push_back(Reply::Response(response));
        self
    }

    /// Queue a transport failure
    pub fn fail(self, message: &str) -> Self {
        lock(&self.replies).push_back(Reply::Failure(message.to_string()));
        self
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

/// A response template with a placeholder request
pub fn response(status: u16) -> Response {
    Response::new(
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Method::GET,
        Url::parse("http://scripted.invalid/").expect("static placeholder URL parses"),
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Sender for ScriptedSender {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let reply = lock(&self.replies).pop_front();
        let method = request.method.clone();
        let url = request.url.clone();
        lock(&self.requests).push(request);

        match reply {
            Some(Reply::Response(mut response)) => {
                response.request_method = method;
                response.request_url = url;
                Ok(response)
            }
            Some(Reply::Failure(message)) => Err(TransportError::new(message)),
            None => Err(TransportError::new("no scripted reply left")),
        }
    }
}
