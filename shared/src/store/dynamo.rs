use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use log::{debug, error, info};
use std::collections::{BTreeSet, HashMap};
use std::error::Error as StdError;

use super::{InvitationStore, LoanStore, PushTokenStore, Result, SavingsGoalStore};
use crate::config::TableConfig;
use crate::error::StoreError;
use crate::models::{
    Invitation, InvitationResolution, InvitationStatus, Loan, PushToken, SavingsGoal,
};

const INVITER_INDEX: &str = "inviterId-index";
const INVITEE_EMAIL_INDEX: &str = "inviteeEmail-index";
const OWNER_INDEX: &str = "ownerId-index";

type Item = HashMap<String, AttributeValue>;

async fn create_client() -> Client {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    Client::new(&config)
}

/// Maps an SDK failure onto the closed store error by its service error code.
fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: std::fmt::Debug,
{
    let detail = format!("{}: {}", operation, DisplayErrorContext(&err));
    match err.code() {
        Some("AccessDeniedException") | Some("UnrecognizedClientException") => {
            StoreError::AccessDenied(detail)
        }
        Some("ConditionalCheckFailedException") => StoreError::ConditionFailed(detail),
        _ => {
            error!("DynamoDB {} failed: {}", operation, detail);
            StoreError::Other(detail)
        }
    }
}

fn key(id: &str) -> Item {
    HashMap::from([("id".to_string(), AttributeValue::S(id.to_string()))])
}

async fn get_item<T>(client: &Client, table: &str, id: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let output = client
        .get_item()
        .table_name(table)
        .set_key(Some(key(id)))
        .send()
        .await
        .map_err(|e| classify("GetItem", e))?;

    match output.item {
        Some(item) => Ok(serde_dynamo::from_item(item)?),
        None => Err(StoreError::NotFound(format!("{} not found in {}", id, table))),
    }
}

/// Guard applied to a full-item write.
enum WriteGuard<'a> {
    /// The item must not exist yet.
    Create,
    /// The item must exist with this `updatedAt`.
    Unchanged(&'a str),
}

async fn put_item<T>(client: &Client, table: &str, value: &T, guard: WriteGuard<'_>) -> Result<()>
where
    T: serde::Serialize,
{
    let item: Item = serde_dynamo::to_item(value)?;
    let request = client.put_item().table_name(table).set_item(Some(item));

    let request = match guard {
        WriteGuard::Create => request.condition_expression("attribute_not_exists(id)"),
        WriteGuard::Unchanged(previous) => request
            .condition_expression("attribute_exists(id) AND updatedAt = :previous")
            .expression_attribute_values(":previous", AttributeValue::S(previous.to_string())),
    };

    request
        .send()
        .await
        .map_err(|e| classify("PutItem", e))?;
    Ok(())
}

async fn query_index<T>(
    client: &Client,
    table: &str,
    index: &str,
    attribute: &str,
    value: &str,
) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    let mut results = Vec::new();
    let mut start_key: Option<Item> = None;

    loop {
        let output = client
            .query()
            .table_name(table)
            .index_name(index)
            .key_condition_expression("#attr = :value")
            .expression_attribute_names("#attr", attribute)
            .expression_attribute_values(":value", AttributeValue::S(value.to_string()))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await
            .map_err(|e| classify("Query", e))?;

        if let Some(items) = output.items {
            let mut page: Vec<T> = serde_dynamo::from_items(items)?;
            results.append(&mut page);
        }

        match output.last_evaluated_key {
            Some(next) if !next.is_empty() => start_key = Some(next),
            _ => break,
        }
    }

    Ok(results)
}

async fn scan_with_filter<T>(
    client: &Client,
    table: &str,
    filter: &str,
    names: &[(&str, &str)],
    values: &[(&str, AttributeValue)],
) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    let mut results = Vec::new();
    let mut start_key: Option<Item> = None;

    loop {
        let mut request = client
            .scan()
            .table_name(table)
            .filter_expression(filter)
            .set_exclusive_start_key(start_key.take());
        for (name, attr) in names {
            request = request.expression_attribute_names(*name, *attr);
        }
        for (name, value) in values {
            request = request.expression_attribute_values(*name, value.clone());
        }

        let output = request.send().await.map_err(|e| classify("Scan", e))?;

        if let Some(items) = output.items {
            let mut page: Vec<T> = serde_dynamo::from_items(items)?;
            results.append(&mut page);
        }

        match output.last_evaluated_key {
            Some(next) if !next.is_empty() => start_key = Some(next),
            _ => break,
        }
    }

    Ok(results)
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

pub struct DynamoInvitationStore {
    client: Client,
    table_name: String,
}

impl DynamoInvitationStore {
    pub async fn new() -> Self {
        let table_name = TableConfig::from_env().invitations;
        info!("Creating DynamoInvitationStore with table '{}'", table_name);
        Self {
            client: create_client().await,
            table_name,
        }
    }

    pub fn with_client_and_table(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl InvitationStore for DynamoInvitationStore {
    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation> {
        debug!("Creating invitation id={}", invitation.id);
        put_item(&self.client, &self.table_name, &invitation, WriteGuard::Create).await?;
        Ok(invitation)
    }

    async fn get_invitation(&self, id: &str) -> Result<Invitation> {
        get_item(&self.client, &self.table_name, id).await
    }

    async fn get_invitations_by_inviter(&self, inviter_id: &str) -> Result<Vec<Invitation>> {
        query_index(
            &self.client,
            &self.table_name,
            INVITER_INDEX,
            "inviterId",
            inviter_id,
        )
        .await
    }

    async fn get_pending_invitations_for_email(&self, email: &str) -> Result<Vec<Invitation>> {
        let invitations: Vec<Invitation> = query_index(
            &self.client,
            &self.table_name,
            INVITEE_EMAIL_INDEX,
            "inviteeEmail",
            email,
        )
        .await?;
        Ok(invitations.into_iter().filter(|i| i.is_pending()).collect())
    }

    async fn resolve_invitation(
        &self,
        id: &str,
        expected: InvitationStatus,
        resolution: &InvitationResolution,
    ) -> Result<Invitation> {
        debug!(
            "Resolving invitation id={} from {} to {}",
            id, expected, resolution.status
        );

        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key(id)))
            .update_expression(
                "SET #status = :status, inviteeId = :invitee, updatedAt = :updated",
            )
            .condition_expression("attribute_exists(id) AND #status = :expected")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":status",
                AttributeValue::S(resolution.status.to_string()),
            )
            .expression_attribute_values(
                ":invitee",
                AttributeValue::S(resolution.invitee_id.clone()),
            )
            .expression_attribute_values(
                ":updated",
                AttributeValue::S(resolution.updated_at.clone()),
            )
            .expression_attribute_values(":expected", AttributeValue::S(expected.to_string()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| classify("UpdateItem", e))?;

        let attributes = output
            .attributes
            .ok_or_else(|| StoreError::Other("UpdateItem returned no attributes".into()))?;
        Ok(serde_dynamo::from_item(attributes)?)
    }
}

// ---------------------------------------------------------------------------
// Savings goals
// ---------------------------------------------------------------------------

pub struct DynamoSavingsGoalStore {
    client: Client,
    table_name: String,
}

impl DynamoSavingsGoalStore {
    pub async fn new() -> Self {
        let table_name = TableConfig::from_env().savings_goals;
        info!("Creating DynamoSavingsGoalStore with table '{}'", table_name);
        Self {
            client: create_client().await,
            table_name,
        }
    }

    pub fn with_client_and_table(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl SavingsGoalStore for DynamoSavingsGoalStore {
    async fn create_goal(&self, goal: SavingsGoal) -> Result<SavingsGoal> {
        put_item(&self.client, &self.table_name, &goal, WriteGuard::Create).await?;
        Ok(goal)
    }

    async fn get_goal(&self, id: &str) -> Result<SavingsGoal> {
        get_item(&self.client, &self.table_name, id).await
    }

    async fn get_goals_for_user(&self, user_id: &str) -> Result<Vec<SavingsGoal>> {
        let mut goals: Vec<SavingsGoal> = query_index(
            &self.client,
            &self.table_name,
            OWNER_INDEX,
            "ownerId",
            user_id,
        )
        .await?;

        // Membership has no index; members is a list attribute.
        let shared: Vec<SavingsGoal> = scan_with_filter(
            &self.client,
            &self.table_name,
            "contains(members, :user)",
            &[],
            &[(":user", AttributeValue::S(user_id.to_string()))],
        )
        .await?;

        for goal in shared {
            if !goals.iter().any(|g| g.id == goal.id) {
                goals.push(goal);
            }
        }
        Ok(goals)
    }

    async fn update_goal(
        &self,
        goal: SavingsGoal,
        previous_updated_at: &str,
    ) -> Result<SavingsGoal> {
        put_item(
            &self.client,
            &self.table_name,
            &goal,
            WriteGuard::Unchanged(previous_updated_at),
        )
        .await?;
        Ok(goal)
    }

    async fn delete_goal(&self, id: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key(id)))
            .condition_expression("attribute_exists(id)")
            .send()
            .await
            .map_err(|e| match classify("DeleteItem", e) {
                StoreError::ConditionFailed(detail) => StoreError::NotFound(detail),
                other => other,
            })?;
        Ok(())
    }

    async fn add_member(
        &self,
        goal_id: &str,
        user_id: &str,
        invitation_id: &str,
        updated_at: &str,
    ) -> Result<SavingsGoal> {
        let goal: SavingsGoal = get_item(&self.client, &self.table_name, goal_id).await?;

        let mut members: BTreeSet<String> = goal.members.clone();
        members.insert(user_id.to_string());
        let members_value: AttributeValue = serde_dynamo::to_attribute_value(&members)?;

        // Guard on the previous updatedAt so a concurrent writer can't be clobbered.
        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key(goal_id)))
            .update_expression(
                "SET members = :members, lastInvitationId = :invitation, updatedAt = :updated",
            )
            .condition_expression("attribute_exists(id) AND updatedAt = :previous")
            .expression_attribute_values(":members", members_value)
            .expression_attribute_values(
                ":invitation",
                AttributeValue::S(invitation_id.to_string()),
            )
            .expression_attribute_values(":updated", AttributeValue::S(updated_at.to_string()))
            .expression_attribute_values(":previous", AttributeValue::S(goal.updated_at.clone()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| classify("UpdateItem", e))?;

        let attributes = output
            .attributes
            .ok_or_else(|| StoreError::Other("UpdateItem returned no attributes".into()))?;
        Ok(serde_dynamo::from_item(attributes)?)
    }

    async fn scan_goals_with_reminders(&self) -> Result<Vec<SavingsGoal>> {
        scan_with_filter(
            &self.client,
            &self.table_name,
            "attribute_exists(#reminder) AND attribute_type(#reminder, :map)",
            &[("#reminder", "reminder")],
            &[(":map", AttributeValue::S("M".to_string()))],
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

pub struct DynamoLoanStore {
    client: Client,
    table_name: String,
}

impl DynamoLoanStore {
    pub async fn new() -> Self {
        let table_name = TableConfig::from_env().loans;
        info!("Creating DynamoLoanStore with table '{}'", table_name);
        Self {
            client: create_client().await,
            table_name,
        }
    }

    pub fn with_client_and_table(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl LoanStore for DynamoLoanStore {
    async fn create_loan(&self, loan: Loan) -> Result<Loan> {
        put_item(&self.client, &self.table_name, &loan, WriteGuard::Create).await?;
        Ok(loan)
    }

    async fn get_loan(&self, id: &str) -> Result<Loan> {
        get_item(&self.client, &self.table_name, id).await
    }

    async fn get_loans_by_owner(&self, owner_id: &str) -> Result<Vec<Loan>> {
        query_index(
            &self.client,
            &self.table_name,
            OWNER_INDEX,
            "ownerId",
            owner_id,
        )
        .await
    }

    async fn update_loan(&self, loan: Loan, previous_updated_at: &str) -> Result<Loan> {
        put_item(
            &self.client,
            &self.table_name,
            &loan,
            WriteGuard::Unchanged(previous_updated_at),
        )
        .await?;
        Ok(loan)
    }
}

// ---------------------------------------------------------------------------
// Push tokens
// ---------------------------------------------------------------------------

pub struct DynamoPushTokenStore {
    client: Client,
    table_name: String,
}

impl DynamoPushTokenStore {
    pub async fn new() -> Self {
        let table_name = TableConfig::from_env().push_tokens;
        info!("Creating DynamoPushTokenStore with table '{}'", table_name);
        Self {
            client: create_client().await,
            table_name,
        }
    }

    pub fn with_client_and_table(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl PushTokenStore for DynamoPushTokenStore {
    async fn save_push_token(&self, token: PushToken) -> Result<PushToken> {
        // Keyed by userId; a newer registration replaces the old one.
        let item: Item = serde_dynamo::to_item(&token)?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| classify("PutItem", e))?;
        Ok(token)
    }

    async fn get_push_tokens(&self, user_ids: &[String]) -> Result<Vec<PushToken>> {
        let mut tokens = Vec::new();
        for user_id in user_ids {
            let output = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("userId", AttributeValue::S(user_id.clone()))
                .send()
                .await
                .map_err(|e| classify("GetItem", e))?;

            if let Some(item) = output.item {
                tokens.push(serde_dynamo::from_item(item)?);
            }
        }
        Ok(tokens)
    }
}
