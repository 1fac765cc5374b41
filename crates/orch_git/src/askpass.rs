//! Token injection for fetch/push, mirroring the intent of a temporary
//! `GIT_ASKPASS` script without shelling out: the token lives only inside
//! the credentials callback closure and is never embedded in a URL or argv.

use git2::{Cred, RemoteCallbacks};

pub fn callbacks_with_token<'a>(token: Option<&'a str>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed_types| {
        if let Some(token) = token {
            if allowed_types.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
                return Cred::userpass_plaintext(username_from_url.unwrap_or("x-access-token"), token);
            }
        }
        Cred::default()
    });
    callbacks
}
