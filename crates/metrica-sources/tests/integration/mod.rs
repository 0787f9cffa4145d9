mod api_client;
mod crm_api;
mod ledger_api;
mod membership_api;
