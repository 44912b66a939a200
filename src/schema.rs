// Diesel table definitions, kept in sync with repository/schema_sqlite.sql.

diesel::table! {
    companies (id) {
        id -> BigInt,
        name -> Text,
        normalized_name -> Text,
        legal_name -> Nullable<Text>,
        website -> Nullable<Text>,
        fund -> Nullable<Text>,
        description -> Nullable<Text>,
        is_portfolio -> Bool,
        last_update_date -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    contacts (id) {
        id -> BigInt,
        company_id -> BigInt,
        first_name -> Nullable<Text>,
        last_name -> Nullable<Text>,
        email -> Text,
        job_title -> Nullable<Text>,
        is_primary -> Bool,
        email_bounced -> Bool,
    }
}

diesel::table! {
    email_updates (id) {
        id -> BigInt,
        company_id -> Nullable<BigInt>,
        fingerprint -> Text,
        sender -> Text,
        original_sender -> Nullable<Text>,
        subject -> Text,
        body -> Text,
        received_at -> Text,
        has_attachments -> Bool,
        update_type -> Nullable<Text>,
        key_topics -> Text,
        processed_at -> Text,
    }
}

diesel::table! {
    attachments (id) {
        id -> BigInt,
        email_update_id -> BigInt,
        company_id -> BigInt,
        filename -> Text,
        stored_path -> Text,
        file_size -> BigInt,
        category -> Text,
    }
}

diesel::table! {
    financial_metrics (id) {
        id -> BigInt,
        company_id -> BigInt,
        email_update_id -> BigInt,
        reporting_period -> Nullable<Text>,
        reporting_date -> Nullable<Text>,
        extracted_at -> Text,
        mrr -> Nullable<Text>,
        arr -> Nullable<Text>,
        qrr -> Nullable<Text>,
        total_revenue -> Nullable<Text>,
        gross_revenue -> Nullable<Text>,
        net_revenue -> Nullable<Text>,
        mrr_growth -> Nullable<Text>,
        arr_growth -> Nullable<Text>,
        revenue_growth_yoy -> Nullable<Text>,
        revenue_growth_mom -> Nullable<Text>,
        cash_balance -> Nullable<Text>,
        net_burn -> Nullable<Text>,
        gross_burn -> Nullable<Text>,
        runway_months -> Nullable<Text>,
        gross_margin -> Nullable<Text>,
        ebitda -> Nullable<Text>,
        ebitda_margin -> Nullable<Text>,
        net_income -> Nullable<Text>,
        customer_count -> Nullable<Text>,
        new_customers -> Nullable<Text>,
        churn_rate -> Nullable<Text>,
        ltv -> Nullable<Text>,
        cac -> Nullable<Text>,
        team_size -> Nullable<Text>,
        bookings -> Nullable<Text>,
        pipeline -> Nullable<Text>,
        key_highlights -> Nullable<Text>,
        key_challenges -> Nullable<Text>,
        funding_status -> Nullable<Text>,
        source_type -> Text,
        source_file -> Nullable<Text>,
        extraction_confidence -> Text,
        extraction_notes -> Nullable<Text>,
    }
}

diesel::table! {
    metric_extractions (id) {
        id -> BigInt,
        email_update_id -> BigInt,
        attachment_id -> Nullable<BigInt>,
        stage -> Text,
        status -> Text,
        raw_response -> Nullable<Text>,
        error_message -> Nullable<Text>,
        retry_count -> Integer,
        extracted_at -> Text,
    }
}

diesel::joinable!(contacts -> companies (company_id));
diesel::joinable!(email_updates -> companies (company_id));
diesel::joinable!(attachments -> email_updates (email_update_id));
diesel::joinable!(financial_metrics -> email_updates (email_update_id));
diesel::joinable!(metric_extractions -> email_updates (email_update_id));

diesel::allow_tables_to_appear_in_same_query!(
    companies,
    contacts,
    email_updates,
    attachments,
    financial_metrics,
    metric_extractions,
);
