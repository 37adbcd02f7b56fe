use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{BusinessDetails, SaveBusinessRequest};
use crate::{
    error::{AppError, AppResult},
    store::{repo_types::BusinessFields, CredentialStore},
};

pub async fn get_business(
    store: &dyn CredentialStore,
    user_id: Uuid,
) -> AppResult<BusinessDetails> {
    Ok(store
        .find_business(user_id)
        .await?
        .map(BusinessDetails::from)
        .unwrap_or_default())
}

#[instrument(skip(store, req))]
pub async fn save_business(
    store: &dyn CredentialStore,
    user_id: Uuid,
    req: SaveBusinessRequest,
) -> AppResult<BusinessDetails> {
    let trimmed = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let name = trimmed(req.name);
    let job_position = trimmed(req.job_position);

    let (Some(name), Some(job_position)) = (name.clone(), job_position.clone()) else {
        let mut fields = Vec::new();
        if name.is_none() {
            fields.push("name");
        }
        if job_position.is_none() {
            fields.push("job_position");
        }
        return Err(AppError::Validation { fields });
    };

    let fields = BusinessFields {
        name,
        job_position,
        team_size: trimmed(req.team_size),
        location: trimmed(req.location),
    };

    let row = match req.id {
        Some(id) => store
            .update_business(id, user_id, fields)
            .await?
            .ok_or_else(|| AppError::NotFound("Business not found".into()))?,
        None => store.insert_business(user_id, fields).await?,
    };
    info!(business_id = %row.id, "business saved");
    Ok(row.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{memory::MemoryStore, repo_types::NewUser};

    async fn owner(store: &MemoryStore, email: &str) -> Uuid {
        store
            .insert_user(NewUser {
                email: email.into(),
                username: "owner".into(),
                ..NewUser::default()
            })
            .await
            .unwrap()
            .id
    }

    fn request(id: Option<Uuid>, name: &str) -> SaveBusinessRequest {
        SaveBusinessRequest {
            id,
            name: Some(name.into()),
            job_position: Some("Founder".into()),
            team_size: Some("2-10".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_details_before_onboarding() {
        let store = MemoryStore::new();
        let uid = owner(&store, "a@example.com").await;
        assert_eq!(
            get_business(&store, uid).await.unwrap(),
            BusinessDetails::default()
        );
    }

    #[tokio::test]
    async fn insert_then_update() {
        let store = MemoryStore::new();
        let uid = owner(&store, "b@example.com").await;
        let created = save_business(&store, uid, request(None, "Acme")).await.unwrap();
        let id = created.id.expect("row id");

        let updated = save_business(&store, uid, request(Some(id), "Acme Labs"))
            .await
            .unwrap();
        assert_eq!(updated.id, Some(id));
        assert_eq!(get_business(&store, uid).await.unwrap().name, "Acme Labs");
    }

    #[tokio::test]
    async fn requires_name_and_position() {
        let store = MemoryStore::new();
        let uid = owner(&store, "c@example.com").await;
        let err = save_business(&store, uid, SaveBusinessRequest::default())
            .await
            .unwrap_err();
        match err {
            AppError::Validation { fields } => assert_eq!(fields, vec!["name", "job_position"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cannot_update_someone_elses_business() {
        let store = MemoryStore::new();
        let alice = owner(&store, "d@example.com").await;
        let mallory = owner(&store, "e@example.com").await;
        let id = save_business(&store, alice, request(None, "Alice Co"))
            .await
            .unwrap()
            .id;
        let err = save_business(&store, mallory, request(id, "Stolen"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(get_business(&store, alice).await.unwrap().name, "Alice Co");
    }
}
