// 👤 Actor Entity - authenticated portal user
//
// Identity is the numeric id only: two actors are the same actor iff their
// ids match, whatever their name or email say.

use serde::{Deserialize, Serialize};

pub type ActorId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub email: String,
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Actor {
            id,
            name: name.into(),
            email: email.into(),
        }
    }
}

impl PartialEq for Actor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Actor {}
