#![cfg(not(tarpaulin_include))]

use crate::config;
use crate::login;
use crate::mailer::Mailer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

const INVITATION_TTL: u64 = 24 * 60 * 60; // 24 hours in seconds
const MAX_ACTIVE_INVITATIONS_PER_EMAIL: usize = 5;

/// A collaboration team. Datasets shared with a team are readable and
/// editable by every member; only the dataset owner may share.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub members: Vec<TeamMember>,
}

/// Team membership with a role: `"owner"` or `"member"`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TeamMember {
    pub username: String,
    pub role: String,
}

/// A pending invitation to join a team, addressed to an email that has no
/// account yet.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Invitation {
    pub email: String,
    pub token: String,
    pub team_id: String,
    pub expires: SystemTime,
}

impl Team {
    pub fn is_owner(&self, username: &str) -> bool {
        self.members
            .iter()
            .any(|m| m.username == username && m.role == "owner")
    }

    pub fn has_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m.username == username)
    }
}

impl Invitation {
    pub fn is_active(&self) -> bool {
        self.expires > SystemTime::now()
    }
}

fn teams_file() -> std::path::PathBuf {
    config::data_dir().join("teams.json")
}

fn invitations_file() -> std::path::PathBuf {
    config::data_dir().join("invitations.json")
}

pub fn get_teams() -> Result<Vec<Team>, String> {
    read_json(&teams_file())
}

pub fn save_teams(teams: &[Team]) -> Result<(), String> {
    write_json(&teams_file(), teams)
}

pub fn get_invitations() -> Result<Vec<Invitation>, String> {
    read_json(&invitations_file())
}

pub fn save_invitations(invitations: &[Invitation]) -> Result<(), String> {
    write_json(&invitations_file(), invitations)
}

fn read_json<T: serde::de::DeserializeOwned + Default>(
    path: &std::path::Path,
) -> Result<T, String> {
    match fs::read_to_string(path) {
        Ok(data) => {
            serde_json::from_str(&data).map_err(|_| format!("Failed to parse {:?}", path))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(_) => Err(format!("Failed to read {:?}", path)),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &std::path::Path, value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|_| "Failed to serialize data".to_string())?;
    fs::write(path, json).map_err(|_| format!("Failed to write {:?}", path))
}

/// The team a user belongs to, if any. Users belong to at most one team.
pub fn team_of(username: &str) -> Result<Option<Team>, String> {
    let teams = get_teams()?;
    Ok(teams.into_iter().find(|t| t.has_member(username)))
}

/// Create a team with the caller as its owner. Fails when the caller is
/// already part of a team.
pub fn create_team(username: &str, name: Option<String>) -> Result<Team, String> {
    let mut teams = get_teams()?;
    if teams.iter().any(|t| t.has_member(username)) {
        return Err("You are already part of a team".to_string());
    }

    let team = Team {
        id: Uuid::new_v4().to_string(),
        name: name.unwrap_or_else(|| format!("{}'s Team", username)),
        members: vec![TeamMember {
            username: username.to_string(),
            role: "owner".to_string(),
        }],
    };

    teams.push(team.clone());
    save_teams(&teams)?;
    Ok(team)
}

/// Invite an email address to the caller's team, creating the team first if
/// the caller doesn't own one yet.
///
/// A re-invite refreshes the existing token; otherwise at most five active
/// invitations may exist per address. The invitation is persisted before
/// the email goes out and rolled back if sending fails.
pub fn invite(inviter: &str, email: &str) -> Result<Invitation, String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if login::find_user_by_email(email)?.is_some() {
        return Err("User with this email already exists".to_string());
    }

    let team = match team_of(inviter)? {
        Some(team) if team.is_owner(inviter) => team,
        Some(_) => return Err("Only the team owner can invite members".to_string()),
        None => create_team(inviter, None)?,
    };

    let token = Uuid::new_v4().to_string();
    let expires = SystemTime::now() + Duration::from_secs(INVITATION_TTL);

    let mut invitations = get_invitations()?;
    invitations.retain(|i| i.is_active());

    let invitation = if let Some(existing) = invitations
        .iter_mut()
        .find(|i| i.email == email && i.team_id == team.id)
    {
        existing.token = token;
        existing.expires = expires;
        existing.clone()
    } else {
        let active = invitations.iter().filter(|i| i.email == email).count();
        if active >= MAX_ACTIVE_INVITATIONS_PER_EMAIL {
            return Err(format!(
                "Maximum {} active invitations allowed per email",
                MAX_ACTIVE_INVITATIONS_PER_EMAIL
            ));
        }
        let invitation = Invitation {
            email: email.to_string(),
            token,
            team_id: team.id.clone(),
            expires,
        };
        invitations.push(invitation.clone());
        invitation
    };

    save_invitations(&invitations)?;

    let link = format!(
        "{}/signup?token={}",
        config::base_url(),
        urlencoding::encode(&invitation.token)
    );
    let mailer = Mailer::new().map_err(|e| format!("Mailer unavailable: {}", e))?;
    if let Err(e) = mailer.send_invitation(email, &link) {
        // the invitation is useless if the email never went out
        let mut invitations = get_invitations()?;
        invitations.retain(|i| i.token != invitation.token);
        save_invitations(&invitations)?;
        return Err(format!("Failed to send invitation email: {}", e));
    }

    log::info!("[INVITE] Invitation sent to {} for team {}", email, team.id);
    Ok(invitation)
}

/// Look up an invitation by token, filtering out expired ones.
pub fn validate_invitation(token: &str) -> Result<Option<Invitation>, String> {
    let invitations = get_invitations()?;
    Ok(invitations
        .into_iter()
        .find(|i| i.token == token && i.is_active()))
}

/// Consume an invitation: add the new user to the inviting team and drop
/// the invitation record.
pub fn accept_invitation(token: &str, username: &str) -> Result<Team, String> {
    let Some(invitation) = validate_invitation(token)? else {
        return Err("Invitation is invalid or has expired".to_string());
    };

    let mut teams = get_teams()?;
    let team = teams
        .iter_mut()
        .find(|t| t.id == invitation.team_id)
        .ok_or_else(|| "Inviting team no longer exists".to_string())?;

    if !team.has_member(username) {
        team.members.push(TeamMember {
            username: username.to_string(),
            role: "member".to_string(),
        });
    }
    let joined = team.clone();
    save_teams(&teams)?;

    let mut invitations = get_invitations()?;
    invitations.retain(|i| i.token != token);
    save_invitations(&invitations)?;

    Ok(joined)
}

/// Remove a member from a team. Owner only; the owner cannot be removed.
pub fn remove_member(owner: &str, member: &str) -> Result<Team, String> {
    let mut teams = get_teams()?;
    let team = teams
        .iter_mut()
        .find(|t| t.has_member(owner))
        .ok_or_else(|| "You are not part of a team".to_string())?;

    if !team.is_owner(owner) {
        return Err("Only the team owner can remove members".to_string());
    }
    if owner == member {
        return Err("The team owner cannot be removed".to_string());
    }
    if !team.has_member(member) {
        return Err("No such team member".to_string());
    }

    team.members.retain(|m| m.username != member);
    let updated = team.clone();
    save_teams(&teams)?;
    Ok(updated)
}
