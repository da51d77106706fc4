diesel::table! {
    hazard_reports (id) {
        id -> Integer,
        barangay_id -> Nullable<Integer>,
        custom_location -> Nullable<Text>,
        category -> Text,
        description -> Nullable<Text>,
        contact_name -> Nullable<Text>,
        contact_number -> Nullable<Text>,
        latitude -> Nullable<Double>,
        longitude -> Nullable<Double>,
        status -> Text,
        reported_at -> Timestamptz,
    }
}

diesel::table! {
    report_photos (id) {
        id -> Integer,
        report_id -> Integer,
        storage_path -> Text,
    }
}

diesel::joinable!(report_photos -> hazard_reports (report_id));
diesel::allow_tables_to_appear_in_same_query!(hazard_reports, report_photos);
